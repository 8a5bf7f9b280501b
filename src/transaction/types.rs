//! Transaction state and the strict two-phase locking state machine.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::common::{Lsn, RecordId, TransactionId, INVALID_LSN};

/// Isolation level requested at `Begin`. This crate enforces a single
/// concurrency-control protocol (strict 2PL, S/X locks) regardless of the
/// level named here; the field is carried on the transaction so callers can
/// record intent, even though no MVCC snapshotting distinguishes the levels
/// behaviorally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Acquiring locks; no release has happened yet.
    Growing,
    /// Has released at least one lock; may not acquire any more.
    Shrinking,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub(super) struct TransactionInner {
    pub state: TransactionState,
    pub prev_lsn: Lsn,
    pub shared_locks: HashSet<RecordId>,
    pub exclusive_locks: HashSet<RecordId>,
}

/// A transaction's mutable state lives behind its own latch, separate from
/// the transaction manager's table of transactions and from the lock
/// manager's own table latch — the lock manager only ever touches a
/// transaction's lock sets and state through this latch, never the other
/// way around.
pub struct Transaction {
    pub id: TransactionId,
    pub isolation_level: IsolationLevel,
    pub(super) inner: Mutex<TransactionInner>,
}

impl Transaction {
    pub fn new(id: TransactionId, start_lsn: Lsn) -> Self {
        Self::with_isolation(id, start_lsn, IsolationLevel::default())
    }

    pub fn with_isolation(id: TransactionId, start_lsn: Lsn, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            inner: Mutex::new(TransactionInner {
                state: TransactionState::Growing,
                prev_lsn: start_lsn,
                shared_locks: HashSet::new(),
                exclusive_locks: HashSet::new(),
            }),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    pub fn set_state(&self, state: TransactionState) {
        self.inner.lock().state = state;
    }

    pub fn prev_lsn(&self) -> Lsn {
        self.inner.lock().prev_lsn
    }

    pub fn set_prev_lsn(&self, lsn: Lsn) {
        self.inner.lock().prev_lsn = lsn;
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.lock().state == TransactionState::Aborted
    }
}

impl Default for TransactionInner {
    fn default() -> Self {
        Self {
            state: TransactionState::Growing,
            prev_lsn: INVALID_LSN,
            shared_locks: HashSet::new(),
            exclusive_locks: HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_starts_growing() {
        let txn = Transaction::new(1, 5);
        assert_eq!(txn.state(), TransactionState::Growing);
        assert_eq!(txn.prev_lsn(), 5);
        assert_eq!(txn.isolation_level, IsolationLevel::Serializable);
    }

    #[test]
    fn with_isolation_records_requested_level() {
        let txn = Transaction::with_isolation(1, -1, IsolationLevel::ReadCommitted);
        assert_eq!(txn.isolation_level, IsolationLevel::ReadCommitted);
    }

    #[test]
    fn terminal_states_are_recognized() {
        assert!(TransactionState::Committed.is_terminal());
        assert!(TransactionState::Aborted.is_terminal());
        assert!(!TransactionState::Growing.is_terminal());
        assert!(!TransactionState::Shrinking.is_terminal());
    }
}
