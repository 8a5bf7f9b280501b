//! Transaction lifecycle: Begin, Commit, Abort.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::TransactionId;
use crate::error::{DbError, Result};
use crate::stats::Stats;
use crate::wal::{LogManager, LogRecord};

use super::lock_manager::LockManager;
use super::types::{IsolationLevel, Transaction, TransactionState};

pub struct TransactionManager {
    next_txn_id: AtomicI32,
    active: RwLock<HashMap<TransactionId, Arc<Transaction>>>,
    lock_manager: Arc<LockManager>,
    log_manager: Arc<LogManager>,
    stats: Arc<Stats>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>, log_manager: Arc<LogManager>, stats: Arc<Stats>) -> Self {
        Self {
            next_txn_id: AtomicI32::new(1),
            active: RwLock::new(HashMap::new()),
            lock_manager,
            log_manager,
            stats,
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Appends a BEGIN record, stores its LSN as the transaction's
    /// `prev_lsn`, and registers the transaction as active. Defaults to
    /// `Serializable`; see `begin_with_isolation` to request another level.
    pub fn begin(&self) -> Result<Arc<Transaction>> {
        self.begin_with_isolation(IsolationLevel::default())
    }

    /// As `begin`, but records the requested isolation level on the
    /// transaction instead of defaulting it.
    pub fn begin_with_isolation(&self, isolation: IsolationLevel) -> Result<Arc<Transaction>> {
        let id = self.next_txn_id.fetch_add(1, Ordering::AcqRel);
        let lsn = self.log_manager.append(LogRecord::begin(id))?;
        let txn = Arc::new(Transaction::with_isolation(id, lsn, isolation));
        self.active.write().insert(id, Arc::clone(&txn));
        tracing::debug!(txn_id = id, ?isolation, lsn, "transaction began");
        Ok(txn)
    }

    /// Appends COMMIT with `prev_lsn` pointing at the transaction's last
    /// record, forces the log up through it, releases every held lock, and
    /// removes the transaction from the active set.
    pub fn commit(&self, txn: &Transaction) -> Result<()> {
        let lsn = self
            .log_manager
            .append(LogRecord::commit(txn.id, txn.prev_lsn()))?;
        self.log_manager.flush(lsn)?;
        txn.set_prev_lsn(lsn);
        txn.set_state(TransactionState::Committed);
        self.lock_manager.unlock_all(txn);
        self.active.write().remove(&txn.id);
        self.stats.record_txn_committed();
        tracing::info!(txn_id = txn.id, lsn, "transaction committed");
        Ok(())
    }

    /// Appends ABORT, forces the log, releases locks, and removes the
    /// transaction from the active set. Does not itself undo any data
    /// changes the transaction made — that is the job of the recovery
    /// manager's Undo phase, run only after a crash.
    pub fn abort(&self, txn: &Transaction) -> Result<()> {
        let lsn = self
            .log_manager
            .append(LogRecord::abort(txn.id, txn.prev_lsn()))?;
        self.log_manager.flush(lsn)?;
        txn.set_prev_lsn(lsn);
        txn.set_state(TransactionState::Aborted);
        self.lock_manager.unlock_all(txn);
        self.active.write().remove(&txn.id);
        self.stats.record_txn_aborted();
        tracing::warn!(txn_id = txn.id, lsn, "transaction aborted");
        Ok(())
    }

    pub fn get(&self, id: TransactionId) -> Result<Arc<Transaction>> {
        self.active
            .read()
            .get(&id)
            .cloned()
            .ok_or(DbError::TxnNotFound(id))
    }

    pub fn is_active(&self, id: TransactionId) -> bool {
        self.active.read().contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    pub fn active_ids(&self) -> Vec<TransactionId> {
        self.active.read().keys().copied().collect()
    }
}
