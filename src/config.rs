//! Configuration surface.

use std::time::Duration;

use crate::common::PAGE_SIZE;

/// Default lock-wait cap before a request gives up and aborts its owner.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Default buffer pool capacity, in frames.
pub const DEFAULT_POOL_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Frame array length.
    pub pool_size: usize,
    /// Per-lock-request wait cap before timeout.
    pub lock_timeout: Duration,
    /// When false, `LogManager::append` is a no-op returning `INVALID_LSN`.
    /// Exists for tests that want to exercise buffer pool eviction without
    /// paying for log I/O.
    pub enable_logging: bool,
    /// Directory holding the data file.
    pub data_dir: String,
    /// Directory holding the dedicated log file.
    pub log_dir: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            enable_logging: true,
            data_dir: "./data".to_string(),
            log_dir: "./wal".to_string(),
        }
    }
}

impl DbConfig {
    pub fn data_file_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("rustydb.db")
    }

    pub fn log_file_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.log_dir).join("rustydb.wal")
    }
}

/// Compile-time page size, re-exported here for callers that only need the
/// configuration module.
pub const fn page_size() -> usize {
    PAGE_SIZE
}
