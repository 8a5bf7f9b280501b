//! ARIES-style crash recovery: Analysis, Redo, Undo, and checkpointing.
//!
//! Page content has no catalog or tuple layout in this crate (out of
//! scope); a data record's `value` bytes are written at byte offset
//! `rid.slot` within page `rid.page_id`, clipped to the page boundary. This
//! is the narrowed, catalog-free stand-in for the original table-heap
//! `InsertTuple`/`UpdateTuple`/`DeleteTuple` calls.

use std::collections::HashMap;

use crate::common::{Lsn, PageId, TransactionId, INVALID_LSN, PAGE_SIZE};
use crate::error::Result;
use crate::storage::BufferPoolManager;
use crate::wal::{LogManager, LogPayload, LogRecord, LogRecordKind};

/// Active transaction table: txn id -> LSN of its most recent record.
pub type Att = HashMap<TransactionId, Lsn>;
/// Dirty page table: page id -> LSN of the record that first dirtied it.
pub type Dpt = HashMap<PageId, Lsn>;

fn write_bytes(bpm: &BufferPoolManager, frame_id: usize, slot: u32, value: &[u8]) {
    let offset = slot as usize;
    if offset < PAGE_SIZE {
        let end = (offset + value.len()).min(PAGE_SIZE);
        let mut bytes = bpm.frame(frame_id).write();
        bytes[offset..end].copy_from_slice(&value[..end - offset]);
    }
}

/// Redo's LSN-gated apply: skip if the page already reflects an effect at
/// or past `lsn`, else reapply and stamp page-LSN := `lsn`.
fn apply_value(bpm: &BufferPoolManager, page_id: PageId, slot: u32, value: &[u8], lsn: Lsn) -> Result<()> {
    let frame_id = bpm.fetch_page(page_id)?;
    let page_lsn = bpm.page_lsn(page_id)?;
    if page_lsn < lsn {
        write_bytes(bpm, frame_id, slot, value);
        bpm.set_page_lsn(page_id, lsn)?;
        bpm.unpin_page(page_id, true)?;
    } else {
        bpm.unpin_page(page_id, false)?;
    }
    Ok(())
}

/// Undo's unconditional apply: unlike Redo there is no LSN gate — a
/// loser's before-image is written back regardless of the page's current
/// page-LSN.
fn apply_before_image(bpm: &BufferPoolManager, page_id: PageId, slot: u32, value: &[u8]) -> Result<()> {
    let frame_id = bpm.fetch_page(page_id)?;
    write_bytes(bpm, frame_id, slot, value);
    bpm.unpin_page(page_id, true)?;
    Ok(())
}

/// Scans the replayed log once, building the active-transaction table and
/// dirty-page table as of the end of the log.
pub fn analyze(records: &[LogRecord]) -> (Att, Dpt) {
    let mut att = Att::new();
    let mut dpt = Dpt::new();

    for record in records {
        match record.kind {
            LogRecordKind::Begin => {
                att.insert(record.txn_id, record.lsn);
            }
            LogRecordKind::Commit | LogRecordKind::Abort => {
                att.remove(&record.txn_id);
            }
            LogRecordKind::Insert | LogRecordKind::Update | LogRecordKind::Delete => {
                att.insert(record.txn_id, record.lsn);
                let page_id = match &record.payload {
                    LogPayload::Insert { rid, .. }
                    | LogPayload::Update { rid, .. }
                    | LogPayload::Delete { rid, .. } => Some(rid.page_id),
                    _ => None,
                };
                if let Some(page_id) = page_id {
                    dpt.entry(page_id).or_insert(record.lsn);
                }
            }
            LogRecordKind::Checkpoint => {
                if let LogPayload::Checkpoint { att: ckpt_att, dpt: ckpt_dpt } = &record.payload {
                    for &(txn_id, lsn) in ckpt_att {
                        att.insert(txn_id, lsn);
                    }
                    for &(page_id, lsn) in ckpt_dpt {
                        dpt.entry(page_id).or_insert(lsn);
                    }
                }
            }
        }
    }
    (att, dpt)
}

/// Reapplies every data record whose effect is not yet reflected on its
/// page, in log order, regardless of which transaction produced it or
/// whether it ultimately committed.
pub fn redo(records: &[LogRecord], bpm: &BufferPoolManager) -> Result<()> {
    for record in records {
        let (rid, value) = match &record.payload {
            LogPayload::Insert { rid, value } => (*rid, value),
            LogPayload::Update { rid, new_value, .. } => (*rid, new_value),
            LogPayload::Delete { rid, value } => {
                let cleared = vec![0u8; value.len()];
                apply_value(bpm, rid.page_id, rid.slot, &cleared, record.lsn)?;
                continue;
            }
            _ => continue,
        };
        apply_value(bpm, rid.page_id, rid.slot, value, record.lsn)?;
    }
    Ok(())
}

/// Rolls back every transaction still in the active-transaction table after
/// Redo (the "losers") by reapplying each data record's before-image in
/// reverse log order, then appends an ABORT record for it. No compensation
/// log records are generated — a second crash mid-undo would redo the same
/// before-images again, which is idempotent here since Redo is itself
/// LSN-gated.
pub fn undo(records: &[LogRecord], att: &Att, bpm: &BufferPoolManager, log_manager: &LogManager) -> Result<()> {
    let losers: std::collections::HashSet<TransactionId> = att.keys().copied().collect();
    if losers.is_empty() {
        return Ok(());
    }

    for record in records.iter().rev() {
        if !losers.contains(&record.txn_id) {
            continue;
        }
        match &record.payload {
            LogPayload::Insert { rid, value } => {
                let cleared = vec![0u8; value.len()];
                apply_before_image(bpm, rid.page_id, rid.slot, &cleared)?;
            }
            LogPayload::Update { rid, old_value, .. } => {
                apply_before_image(bpm, rid.page_id, rid.slot, old_value)?;
            }
            LogPayload::Delete { rid, value } => {
                apply_before_image(bpm, rid.page_id, rid.slot, value)?;
            }
            _ => {}
        }
    }

    for &txn_id in &losers {
        let lsn = att[&txn_id];
        log_manager.append(LogRecord::abort(txn_id, lsn))?;
    }
    log_manager.flush(INVALID_LSN)?;
    Ok(())
}

/// Runs Analysis, Redo, and Undo against the full replayed log. Entry point
/// used on startup before any new transactions begin.
pub fn recover(log_manager: &LogManager, bpm: &BufferPoolManager) -> Result<()> {
    let records = log_manager.replay()?;
    if records.is_empty() {
        tracing::info!("recovery: empty log, nothing to replay");
        return Ok(());
    }
    tracing::info!(records = records.len(), "recovery: starting analysis");
    let (att, dpt) = analyze(&records);
    tracing::info!(losers = att.len(), dirty_pages = dpt.len(), "recovery: analysis complete");
    redo(&records, bpm)?;
    tracing::info!("recovery: redo complete");
    undo(&records, &att, bpm, log_manager)?;
    tracing::info!("recovery: undo complete");
    bpm.flush_all_pages()?;
    Ok(())
}

/// Flushes every dirty page, then appends a single checkpoint record
/// carrying the current ATT/DPT snapshot and forces the log. There is no
/// BEGIN_CHECKPOINT/END_CHECKPOINT pair and no fuzzy checkpoint support —
/// this briefly blocks new dirty pages from forming while it runs.
pub fn checkpoint(bpm: &BufferPoolManager, log_manager: &LogManager, att: &Att, dpt: &Dpt) -> Result<()> {
    bpm.flush_all_pages()?;
    let att_vec: Vec<(TransactionId, Lsn)> = att.iter().map(|(&k, &v)| (k, v)).collect();
    let dpt_vec: Vec<(PageId, Lsn)> = dpt.iter().map(|(&k, &v)| (k, v)).collect();
    let lsn = log_manager.append(LogRecord::checkpoint(att_vec, dpt_vec))?;
    log_manager.flush(lsn)?;
    Ok(())
}
