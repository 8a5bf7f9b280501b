//! Log record kinds and wire format.
//!
//! The common header (kind, txn id, prev LSN) is a plain struct every
//! variant embeds, and deserialization is a single dispatch on the kind
//! byte — a polymorphic base-class hierarchy translated into a tagged sum.

use serde::{Deserialize, Serialize};

use crate::common::{Lsn, PageId, RecordId, TransactionId, INVALID_LSN, INVALID_TRANSACTION_ID};
use crate::error::{DbError, Result};

/// Bytes consumed by the fixed part of a record after the length field:
/// kind (4) + txn_id (4) + prev_lsn (4).
pub const HEADER_REMAINDER_LEN: usize = 12;
/// Bytes consumed by the length field itself.
pub const LENGTH_FIELD_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LogRecordKind {
    Begin = 0,
    Commit = 1,
    Abort = 2,
    Insert = 3,
    Update = 4,
    Delete = 5,
    Checkpoint = 6,
}

impl LogRecordKind {
    fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Begin,
            1 => Self::Commit,
            2 => Self::Abort,
            3 => Self::Insert,
            4 => Self::Update,
            5 => Self::Delete,
            6 => Self::Checkpoint,
            _ => return None,
        })
    }
}

/// Per-kind payload. BEGIN/COMMIT/ABORT carry none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogPayload {
    Empty,
    Insert {
        rid: RecordId,
        value: Vec<u8>,
    },
    Update {
        rid: RecordId,
        old_value: Vec<u8>,
        new_value: Vec<u8>,
    },
    Delete {
        rid: RecordId,
        value: Vec<u8>,
    },
    Checkpoint {
        att: Vec<(TransactionId, Lsn)>,
        dpt: Vec<(PageId, Lsn)>,
    },
}

/// A single WAL record. `lsn` is filled in by the log manager at append
/// time (callers construct records with it unset) and is reconstructed
/// positionally during replay — it is never stored on disk, since on-disk
/// order equals append order and position alone recovers it.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub lsn: Lsn,
    pub txn_id: TransactionId,
    pub prev_lsn: Lsn,
    pub kind: LogRecordKind,
    pub payload: LogPayload,
}

impl LogRecord {
    pub fn begin(txn_id: TransactionId) -> Self {
        Self {
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn: INVALID_LSN,
            kind: LogRecordKind::Begin,
            payload: LogPayload::Empty,
        }
    }

    pub fn commit(txn_id: TransactionId, prev_lsn: Lsn) -> Self {
        Self {
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn,
            kind: LogRecordKind::Commit,
            payload: LogPayload::Empty,
        }
    }

    pub fn abort(txn_id: TransactionId, prev_lsn: Lsn) -> Self {
        Self {
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn,
            kind: LogRecordKind::Abort,
            payload: LogPayload::Empty,
        }
    }

    pub fn insert(txn_id: TransactionId, prev_lsn: Lsn, rid: RecordId, value: Vec<u8>) -> Self {
        Self {
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn,
            kind: LogRecordKind::Insert,
            payload: LogPayload::Insert { rid, value },
        }
    }

    pub fn update(
        txn_id: TransactionId,
        prev_lsn: Lsn,
        rid: RecordId,
        old_value: Vec<u8>,
        new_value: Vec<u8>,
    ) -> Self {
        Self {
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn,
            kind: LogRecordKind::Update,
            payload: LogPayload::Update {
                rid,
                old_value,
                new_value,
            },
        }
    }

    pub fn delete(txn_id: TransactionId, prev_lsn: Lsn, rid: RecordId, value: Vec<u8>) -> Self {
        Self {
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn,
            kind: LogRecordKind::Delete,
            payload: LogPayload::Delete { rid, value },
        }
    }

    pub fn checkpoint(att: Vec<(TransactionId, Lsn)>, dpt: Vec<(PageId, Lsn)>) -> Self {
        Self {
            lsn: INVALID_LSN,
            txn_id: INVALID_TRANSACTION_ID,
            prev_lsn: INVALID_LSN,
            kind: LogRecordKind::Checkpoint,
            payload: LogPayload::Checkpoint { att, dpt },
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        match &self.payload {
            LogPayload::Empty => Ok(Vec::new()),
            payload => bincode::serde::encode_to_vec(payload, bincode::config::standard())
                .map_err(|e| DbError::Serialization(e.to_string())),
        }
    }

    /// Serializes `length | kind | txn_id | prev_lsn | payload` into `out`,
    /// where `length` covers everything after the length field itself.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = self.encode_payload()?;
        let length = (HEADER_REMAINDER_LEN + payload.len()) as u32;
        let mut out = Vec::with_capacity(LENGTH_FIELD_LEN + length as usize);
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&(self.kind as u32).to_le_bytes());
        out.extend_from_slice(&(self.txn_id as u32).to_le_bytes());
        out.extend_from_slice(&(self.prev_lsn as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn encoded_len(&self) -> Result<usize> {
        Ok(LENGTH_FIELD_LEN + HEADER_REMAINDER_LEN + self.encode_payload()?.len())
    }

    /// Decodes one record from `bytes`, which must contain exactly
    /// `HEADER_REMAINDER_LEN + payload_len` bytes (the length field is not
    /// included — the caller has already consumed and validated it).
    /// Returns `Corruption` for a kind byte or payload this function can't
    /// parse; callers treat that as "stop scanning this page."
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_REMAINDER_LEN {
            return Err(DbError::Corruption {
                lsn: None,
                reason: "record shorter than header".to_string(),
            });
        }
        let kind_raw = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let txn_id = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as i32;
        let prev_lsn = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as i32;
        let kind = LogRecordKind::from_u32(kind_raw).ok_or_else(|| DbError::Corruption {
            lsn: None,
            reason: format!("unknown log record kind {kind_raw}"),
        })?;
        let payload_bytes = &bytes[HEADER_REMAINDER_LEN..];
        let payload = match kind {
            LogRecordKind::Begin | LogRecordKind::Commit | LogRecordKind::Abort => {
                LogPayload::Empty
            }
            _ => {
                let (payload, _) = bincode::serde::decode_from_slice::<LogPayload, _>(
                    payload_bytes,
                    bincode::config::standard(),
                )
                .map_err(|e| DbError::Corruption {
                    lsn: None,
                    reason: e.to_string(),
                })?;
                payload
            }
        };
        Ok(Self {
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn,
            kind,
            payload,
        })
    }

    pub fn is_data_record(&self) -> bool {
        matches!(
            self.kind,
            LogRecordKind::Insert | LogRecordKind::Update | LogRecordKind::Delete
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_commit_abort_round_trip_with_empty_payload() {
        for rec in [
            LogRecord::begin(1),
            LogRecord::commit(1, 5),
            LogRecord::abort(1, 5),
        ] {
            let bytes = rec.encode().unwrap();
            let length = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
            assert_eq!(length as usize, HEADER_REMAINDER_LEN);
            let decoded = LogRecord::decode(&bytes[LENGTH_FIELD_LEN..]).unwrap();
            assert_eq!(decoded.kind, rec.kind);
            assert_eq!(decoded.txn_id, rec.txn_id);
            assert_eq!(decoded.prev_lsn, rec.prev_lsn);
        }
    }

    #[test]
    fn insert_round_trips_rid_and_value() {
        let rid = RecordId::new(3, 2);
        let rec = LogRecord::insert(7, INVALID_LSN, rid, b"hello".to_vec());
        let bytes = rec.encode().unwrap();
        let decoded = LogRecord::decode(&bytes[LENGTH_FIELD_LEN..]).unwrap();
        match decoded.payload {
            LogPayload::Insert { rid: got_rid, value } => {
                assert_eq!(got_rid, rid);
                assert_eq!(value, b"hello");
            }
            _ => panic!("wrong payload kind"),
        }
    }

    #[test]
    fn unknown_kind_is_corruption() {
        let mut bytes = vec![0u8; HEADER_REMAINDER_LEN];
        bytes[0..4].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(LogRecord::decode(&bytes), Err(DbError::Corruption { .. })));
    }
}
