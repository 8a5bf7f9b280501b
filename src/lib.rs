// RustyDB core - single-node ARIES-style storage engine.
//
// Four subsystems make up the core: a page-oriented buffer pool, a
// write-ahead log, an ARIES-style recovery manager, and a strict
// two-phase-locking lock/transaction manager. Query planning, execution,
// catalog persistence, and the network/shell layers are out of scope here
// and are expected to be built on top of this crate's public contracts.

pub mod common;
pub mod config;
pub mod error;
pub mod recovery;
pub mod stats;
pub mod storage;
pub mod transaction;
pub mod wal;

pub use common::{Lsn, PageId, RecordId, TransactionId};
pub use config::DbConfig;
pub use error::{DbError, Result};
pub use stats::Stats;

use std::sync::Arc;

use storage::{BufferPoolManager, DiskManager};
use transaction::{IsolationLevel, LockManager, Transaction, TransactionManager};
use wal::LogManager;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wires the four core subsystems together over one data file and one
/// dedicated log file, and runs recovery once at construction time. This
/// is the entry point a higher layer (query engine, shell) embeds; it owns
/// no network listener and no catalog of its own.
pub struct Database {
    config: DbConfig,
    buffer_pool: Arc<BufferPoolManager>,
    log_manager: Arc<LogManager>,
    lock_manager: Arc<LockManager>,
    transaction_manager: Arc<TransactionManager>,
    stats: Arc<Stats>,
}

impl Database {
    /// Opens (creating if absent) the data file and dedicated log file
    /// under `config`'s directories, then runs ARIES recovery before
    /// returning: construct disk manager(s), construct log/buffer managers,
    /// recover, then start serving transactions.
    pub fn open(config: DbConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.log_dir)?;

        let stats = Arc::new(Stats::default());

        let data_disk = Arc::new(DiskManager::new(config.data_file_path())?);
        let log_disk = DiskManager::new(config.log_file_path())?;
        let log_manager = Arc::new(LogManager::new(log_disk, config.enable_logging, Arc::clone(&stats)));
        let buffer_pool = Arc::new(BufferPoolManager::new(
            config.pool_size,
            Arc::clone(&data_disk),
            Arc::clone(&log_manager),
            Arc::clone(&stats),
        ));
        let lock_manager = Arc::new(LockManager::new(config.lock_timeout, Arc::clone(&stats)));
        let transaction_manager = Arc::new(TransactionManager::new(
            Arc::clone(&lock_manager),
            Arc::clone(&log_manager),
            Arc::clone(&stats),
        ));

        recovery::recover(&log_manager, &buffer_pool)?;

        Ok(Self {
            config,
            buffer_pool,
            log_manager,
            lock_manager,
            transaction_manager,
            stats,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn transaction_manager(&self) -> &Arc<TransactionManager> {
        &self.transaction_manager
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn begin(&self) -> Result<Arc<Transaction>> {
        self.transaction_manager.begin()
    }

    pub fn begin_with_isolation(&self, isolation: IsolationLevel) -> Result<Arc<Transaction>> {
        self.transaction_manager.begin_with_isolation(isolation)
    }

    pub fn commit(&self, txn: &Transaction) -> Result<()> {
        self.transaction_manager.commit(txn)
    }

    pub fn abort(&self, txn: &Transaction) -> Result<()> {
        self.transaction_manager.abort(txn)
    }

    /// Flushes every dirty buffer frame and the log. A reduced checkpoint:
    /// no BEGIN/END_CHECKPOINT records are written, only the force-flush.
    pub fn checkpoint(&self) -> Result<()> {
        let att = self
            .transaction_manager
            .active_ids()
            .into_iter()
            .map(|id| (id, common::INVALID_LSN))
            .collect();
        recovery::checkpoint(&self.buffer_pool, &self.log_manager, &att, &recovery::Dpt::new())
    }
}
