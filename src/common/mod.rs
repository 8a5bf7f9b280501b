//! Shared identifiers and constants used across every subsystem.

use serde::{Deserialize, Serialize};

/// Page size in bytes. Fixed at compile time per the on-disk format.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel meaning "no page."
pub const INVALID_PAGE_ID: PageId = -1;

/// Sentinel meaning "invalid/none" log sequence number.
pub const INVALID_LSN: Lsn = -1;

/// Signed page identifier. `-1` denotes "no page"; `id >= 0` indexes a
/// `PAGE_SIZE`-aligned region of the backing file at offset `id * PAGE_SIZE`.
pub type PageId = i32;

/// Monotonically assigned log sequence number. `-1` denotes "invalid/none".
pub type Lsn = i32;

/// Transaction identifier, assigned by the transaction manager.
pub type TransactionId = i32;

/// Sentinel used by log records that are not owned by any transaction
/// (checkpoint records).
pub const INVALID_TRANSACTION_ID: TransactionId = -1;

/// A record identifier: the resource unit the lock manager and the log
/// record payloads address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u32,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot)
    }
}
