//! Strict two-phase locking over record ids.
//!
//! One global latch guards the lock table; waiters block on a condition
//! variable with a timeout instead of being tracked by a deadlock detector —
//! cycles are resolved by timing a transaction out, never by graph analysis.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::common::{RecordId, TransactionId};
use crate::error::{DbError, Result};
use crate::stats::Stats;

use super::types::{LockMode, Transaction, TransactionState};

struct LockRequest {
    txn_id: TransactionId,
    mode: LockMode,
    granted: bool,
}

#[derive(Default)]
struct LockRequestQueue {
    requests: Vec<LockRequest>,
    /// Txn id currently upgrading on this resource, if any. While set, the
    /// only request that may be granted is the upgrader's own — a
    /// bystander's brand-new request must wait behind it even if it would
    /// otherwise be compatible with every granted holder.
    upgrading: Option<TransactionId>,
}

impl LockRequestQueue {
    fn can_grant(&self, txn_id: TransactionId, mode: LockMode) -> bool {
        if let Some(upgrader) = self.upgrading {
            if upgrader != txn_id {
                return false;
            }
        }
        for req in &self.requests {
            if !req.granted || req.txn_id == txn_id {
                continue;
            }
            if mode == LockMode::Exclusive || req.mode == LockMode::Exclusive {
                return false;
            }
        }
        true
    }

}

pub struct LockManager {
    table: Mutex<HashMap<RecordId, LockRequestQueue>>,
    cv: Condvar,
    timeout: Duration,
    stats: Arc<Stats>,
}

impl LockManager {
    pub fn new(timeout: Duration, stats: Arc<Stats>) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            cv: Condvar::new(),
            timeout,
            stats,
        }
    }

    pub fn lock_shared(&self, txn: &Transaction, rid: RecordId) -> Result<()> {
        self.acquire(txn, rid, LockMode::Shared)
    }

    pub fn lock_exclusive(&self, txn: &Transaction, rid: RecordId) -> Result<()> {
        self.acquire(txn, rid, LockMode::Exclusive)
    }

    fn acquire(&self, txn: &Transaction, rid: RecordId, mode: LockMode) -> Result<()> {
        let mut table = self.table.lock();

        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return Err(DbError::TxnAborted(txn.id));
        }
        {
            let inner = txn.inner.lock();
            let already_held = match mode {
                LockMode::Shared => {
                    inner.shared_locks.contains(&rid) || inner.exclusive_locks.contains(&rid)
                }
                LockMode::Exclusive => inner.exclusive_locks.contains(&rid),
            };
            if already_held {
                return Ok(());
            }
        }

        let queue = table.entry(rid).or_default();
        let granted = queue.can_grant(txn.id, mode);
        queue.requests.push(LockRequest {
            txn_id: txn.id,
            mode,
            granted,
        });

        if granted {
            self.record_held(txn, rid, mode);
            return Ok(());
        }

        self.wait_for_grant(table, txn, rid, mode)
    }

    fn record_held(&self, txn: &Transaction, rid: RecordId, mode: LockMode) {
        let mut inner = txn.inner.lock();
        match mode {
            LockMode::Shared => inner.shared_locks.insert(rid),
            LockMode::Exclusive => inner.exclusive_locks.insert(rid),
        };
    }

    fn wait_for_grant(
        &self,
        mut table: MutexGuard<'_, HashMap<RecordId, LockRequestQueue>>,
        txn: &Transaction,
        rid: RecordId,
        mode: LockMode,
    ) -> Result<()> {
        self.stats.record_lock_wait();
        let mut remaining = self.timeout;
        loop {
            if txn.is_aborted() {
                Self::remove_request(&mut table, rid, txn.id);
                return Err(DbError::TxnAborted(txn.id));
            }
            let granted = table
                .get(&rid)
                .map(|q| {
                    q.requests
                        .iter()
                        .any(|r| r.txn_id == txn.id && r.granted)
                })
                .unwrap_or(false);
            if granted {
                self.record_held(txn, rid, mode);
                return Ok(());
            }

            let before = std::time::Instant::now();
            let timeout_result = self.cv.wait_for(&mut table, remaining);
            remaining = remaining.saturating_sub(before.elapsed());
            if timeout_result.timed_out() && remaining.is_zero() {
                Self::remove_request(&mut table, rid, txn.id);
                self.stats.record_lock_timeout();
                tracing::warn!(txn_id = txn.id, %rid, ?mode, "lock request timed out");
                return Err(DbError::LockTimeout(txn.id));
            }
        }
    }

    fn remove_request(table: &mut HashMap<RecordId, LockRequestQueue>, rid: RecordId, txn_id: TransactionId) {
        if let Some(queue) = table.get_mut(&rid) {
            queue.requests.retain(|r| r.txn_id != txn_id);
        }
    }

    /// Upgrades a held shared lock to exclusive. Only one upgrade per
    /// resource may be in flight at a time.
    pub fn lock_upgrade(&self, txn: &Transaction, rid: RecordId) -> Result<()> {
        let mut table = self.table.lock();

        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return Err(DbError::TxnAborted(txn.id));
        }
        {
            let inner = txn.inner.lock();
            if inner.exclusive_locks.contains(&rid) {
                return Ok(());
            }
            if !inner.shared_locks.contains(&rid) {
                return Err(DbError::LockUpgradeConflict(txn.id));
            }
        }

        let queue = table.get_mut(&rid).expect("shared lock implies a queue entry");
        if queue.upgrading.is_some() {
            txn.set_state(TransactionState::Aborted);
            tracing::warn!(txn_id = txn.id, %rid, "concurrent upgrade conflict, aborting");
            return Err(DbError::LockUpgradeConflict(txn.id));
        }
        queue.upgrading = Some(txn.id);
        let idx = queue
            .requests
            .iter()
            .position(|r| r.txn_id == txn.id)
            .expect("shared lock implies a request entry");
        queue.requests[idx].mode = LockMode::Exclusive;
        queue.requests[idx].granted = false;
        {
            let mut inner = txn.inner.lock();
            inner.shared_locks.remove(&rid);
        }

        let granted = queue.can_grant(txn.id, LockMode::Exclusive);
        if granted {
            table.get_mut(&rid).unwrap().requests.iter_mut().find(|r| r.txn_id == txn.id).unwrap().granted = true;
            table.get_mut(&rid).unwrap().upgrading = None;
            self.record_held(txn, rid, LockMode::Exclusive);
            self.cv.notify_all();
            return Ok(());
        }

        let result = self.wait_for_upgrade(table, txn, rid);
        result
    }

    fn wait_for_upgrade(
        &self,
        mut table: MutexGuard<'_, HashMap<RecordId, LockRequestQueue>>,
        txn: &Transaction,
        rid: RecordId,
    ) -> Result<()> {
        self.stats.record_lock_wait();
        let mut remaining = self.timeout;
        loop {
            if txn.is_aborted() {
                if let Some(queue) = table.get_mut(&rid) {
                    queue.upgrading = None;
                    queue.requests.retain(|r| r.txn_id != txn.id);
                }
                self.cv.notify_all();
                return Err(DbError::TxnAborted(txn.id));
            }
            let granted = table
                .get(&rid)
                .map(|q| q.requests.iter().any(|r| r.txn_id == txn.id && r.granted))
                .unwrap_or(false);
            if granted {
                table.get_mut(&rid).unwrap().upgrading = None;
                self.record_held(txn, rid, LockMode::Exclusive);
                self.cv.notify_all();
                return Ok(());
            }

            let before = std::time::Instant::now();
            let timeout_result = self.cv.wait_for(&mut table, remaining);
            remaining = remaining.saturating_sub(before.elapsed());
            if timeout_result.timed_out() && remaining.is_zero() {
                // Revert to the held shared lock (the upgrade did not happen).
                if let Some(queue) = table.get_mut(&rid) {
                    queue.upgrading = None;
                    if let Some(req) = queue.requests.iter_mut().find(|r| r.txn_id == txn.id) {
                        req.mode = LockMode::Shared;
                        req.granted = true;
                    }
                }
                self.record_held(txn, rid, LockMode::Shared);
                self.stats.record_lock_timeout();
                self.cv.notify_all();
                return Err(DbError::LockTimeout(txn.id));
            }
        }
    }

    /// Releases a single lock. Moves the transaction into `Shrinking` if it
    /// was still `Growing`.
    pub fn unlock(&self, txn: &Transaction, rid: RecordId) {
        let mut table = self.table.lock();
        if txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }
        {
            let mut inner = txn.inner.lock();
            inner.shared_locks.remove(&rid);
            inner.exclusive_locks.remove(&rid);
        }
        self.release_locked(&mut table, txn.id, rid);
        self.cv.notify_all();
    }

    /// Releases every lock the transaction holds. Called on commit or abort.
    pub fn unlock_all(&self, txn: &Transaction) {
        let mut table = self.table.lock();
        let rids: Vec<RecordId> = {
            let mut inner = txn.inner.lock();
            let rids: Vec<RecordId> = inner
                .shared_locks
                .iter()
                .chain(inner.exclusive_locks.iter())
                .copied()
                .collect();
            inner.shared_locks.clear();
            inner.exclusive_locks.clear();
            rids
        };
        for rid in rids {
            self.release_locked(&mut table, txn.id, rid);
        }
        self.cv.notify_all();
    }

    fn release_locked(&self, table: &mut HashMap<RecordId, LockRequestQueue>, txn_id: TransactionId, rid: RecordId) {
        let Some(queue) = table.get_mut(&rid) else {
            return;
        };
        queue.requests.retain(|r| r.txn_id != txn_id);
        // Grant waiting requests in queue order, each against the holders
        // already granted ahead of it.
        for i in 0..queue.requests.len() {
            if queue.requests[i].granted {
                continue;
            }
            let (txn_id, mode) = (queue.requests[i].txn_id, queue.requests[i].mode);
            if queue.can_grant(txn_id, mode) {
                queue.requests[i].granted = true;
            }
        }
        if queue.requests.is_empty() {
            table.remove(&rid);
        }
    }
}
