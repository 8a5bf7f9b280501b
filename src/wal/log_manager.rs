//! WAL buffering, flushing, and replay.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{Lsn, INVALID_LSN, PAGE_SIZE};
use crate::error::Result;
use crate::stats::Stats;
use crate::storage::disk::DiskManager;

use super::record::{LogRecord, HEADER_REMAINDER_LEN, LENGTH_FIELD_LEN};

struct Buffer {
    bytes: Vec<u8>,
    offset: usize,
}

impl Buffer {
    fn new() -> Self {
        Self {
            bytes: vec![0u8; PAGE_SIZE],
            offset: 0,
        }
    }

    fn reset(&mut self) {
        self.bytes.fill(0);
        self.offset = 0;
    }
}

/// Owns a dedicated log file (its own `DiskManager`), an in-memory
/// page-sized buffer, and the LSN counters. Log pages are never
/// deallocated, so the dedicated disk manager hands out ids 0, 1, 2, ...
/// in allocation order, which is also replay order.
pub struct LogManager {
    disk: DiskManager,
    buffer: Mutex<Buffer>,
    next_lsn: AtomicI32,
    persistent_lsn: AtomicI32,
    enable_logging: bool,
    stats: Arc<Stats>,
}

impl LogManager {
    pub fn new(disk: DiskManager, enable_logging: bool, stats: Arc<Stats>) -> Self {
        Self {
            disk,
            buffer: Mutex::new(Buffer::new()),
            next_lsn: AtomicI32::new(1),
            persistent_lsn: AtomicI32::new(INVALID_LSN),
            enable_logging,
            stats,
        }
    }

    pub fn persistent_lsn(&self) -> Lsn {
        self.persistent_lsn.load(Ordering::Acquire)
    }

    /// Assigns an LSN and buffers the record. Blocks only on the log
    /// latch, never on disk.
    pub fn append(&self, mut record: LogRecord) -> Result<Lsn> {
        if !self.enable_logging {
            return Ok(INVALID_LSN);
        }
        let lsn = self.next_lsn.fetch_add(1, Ordering::AcqRel);
        record.lsn = lsn;
        let encoded = record.encode()?;
        debug_assert!(
            encoded.len() <= PAGE_SIZE,
            "log record does not fit in a single page"
        );

        let mut buffer = self.buffer.lock();
        if buffer.offset + encoded.len() > PAGE_SIZE {
            self.flush_buffer_locked(&mut buffer)?;
        }
        let end = buffer.offset + encoded.len();
        buffer.bytes[buffer.offset..end].copy_from_slice(&encoded);
        buffer.offset = end;
        Ok(lsn)
    }

    /// Forces the buffer to disk, then advances `persistent_lsn` to at
    /// least `lsn` (or to `next_lsn - 1` when `lsn` is `INVALID_LSN`).
    pub fn flush(&self, lsn: Lsn) -> Result<()> {
        let mut buffer = self.buffer.lock();
        if buffer.offset > 0 {
            self.flush_buffer_locked(&mut buffer)?;
        }
        drop(buffer);
        let target = if lsn >= 0 {
            lsn
        } else {
            self.next_lsn.load(Ordering::Acquire) - 1
        };
        self.persistent_lsn.fetch_max(target, Ordering::AcqRel);
        Ok(())
    }

    fn flush_buffer_locked(&self, buffer: &mut Buffer) -> Result<()> {
        let page_id = self.disk.allocate_page();
        self.disk.write_page(page_id, &buffer.bytes)?;
        buffer.reset();
        self.stats.record_log_flush();
        Ok(())
    }

    /// Scans every log page in id order, yielding records in on-disk
    /// (== append) order. A page whose header cannot be decoded stops
    /// that page early and moves on — never fatal.
    pub fn replay(&self) -> Result<Vec<LogRecord>> {
        let mut records = Vec::new();
        let mut next_lsn = 1i32;
        let num_pages = self.disk.num_pages();
        let mut page_buf = vec![0u8; PAGE_SIZE];

        for page_id in 0..num_pages as i32 {
            self.disk.read_page(page_id, &mut page_buf)?;
            let mut offset = 0usize;
            loop {
                if offset + LENGTH_FIELD_LEN > PAGE_SIZE {
                    break;
                }
                let length = u32::from_le_bytes(
                    page_buf[offset..offset + LENGTH_FIELD_LEN].try_into().unwrap(),
                ) as usize;
                if length == 0 {
                    break;
                }
                let record_start = offset + LENGTH_FIELD_LEN;
                if record_start + length > PAGE_SIZE || length < HEADER_REMAINDER_LEN {
                    break;
                }
                let record_bytes = &page_buf[record_start..record_start + length];
                match LogRecord::decode(record_bytes) {
                    Ok(mut record) => {
                        record.lsn = next_lsn;
                        next_lsn += 1;
                        records.push(record);
                        offset = record_start + length;
                    }
                    Err(_) => break,
                }
            }
        }
        Ok(records)
    }
}
