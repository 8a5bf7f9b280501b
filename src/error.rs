//! Crate-wide error taxonomy.
//!
//! Every public operation names the kinds it may surface; anything else is
//! a programming error and is not represented here.

use thiserror::Error;

use crate::common::{Lsn, PageId, TransactionId};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid page id: {0}")]
    InvalidPageId(PageId),

    #[error("no evictable frame available in buffer pool")]
    NoEvictableFrame,

    #[error("page {0} is not resident in the buffer pool")]
    NotResident(PageId),

    #[error("page {0} was already unpinned")]
    AlreadyUnpinned(PageId),

    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("log corruption detected at lsn {lsn:?}: {reason}")]
    Corruption { lsn: Option<Lsn>, reason: String },

    #[error("transaction {0} timed out waiting for a lock")]
    LockTimeout(TransactionId),

    #[error("transaction {0} lost a concurrent lock upgrade on the same resource")]
    LockUpgradeConflict(TransactionId),

    #[error("transaction {0} was aborted")]
    TxnAborted(TransactionId),

    #[error("transaction {0} not found")]
    TxnNotFound(TransactionId),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
