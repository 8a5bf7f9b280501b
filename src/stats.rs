//! Process-wide counters, injected as an explicit dependency into each
//! component rather than kept as a global singleton: every subsystem
//! constructor takes a shared reference to one `Stats` instead of reaching
//! for a process-wide static.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    pub pages_read: AtomicU64,
    pub pages_written: AtomicU64,
    pub log_flushes: AtomicU64,
    pub lock_waits: AtomicU64,
    pub lock_timeouts: AtomicU64,
    pub txns_committed: AtomicU64,
    pub txns_aborted: AtomicU64,
}

impl Stats {
    pub fn record_page_read(&self) {
        self.pages_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_written(&self) {
        self.pages_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_log_flush(&self) {
        self.log_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_wait(&self) {
        self.lock_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_txn_committed(&self) {
        self.txns_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_txn_aborted(&self) {
        self.txns_aborted.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let stats = Stats::default();
        assert_eq!(stats.pages_read.load(Ordering::Relaxed), 0);
        stats.record_page_read();
        stats.record_page_read();
        assert_eq!(stats.pages_read.load(Ordering::Relaxed), 2);
    }
}
