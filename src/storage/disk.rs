//! Page-granular file I/O.
//!
//! One `DiskManager` instance owns one file handle. The buffer pool uses one
//! instance over the data file; the log manager uses a second, independent
//! instance over the dedicated log file — they never share a handle.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::common::{PageId, PAGE_SIZE};
use crate::error::{DbError, Result};

struct Inner {
    file: File,
    num_pages: i64,
    next_page_id: PageId,
    free_pages: Vec<PageId>,
}

pub struct DiskManager {
    inner: Mutex<Inner>,
}

impl DiskManager {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata()?.len();
        let num_pages = (len / PAGE_SIZE as u64) as i64;
        let next_page_id = num_pages as PageId;

        Ok(Self {
            inner: Mutex::new(Inner {
                file,
                num_pages,
                next_page_id,
                free_pages: Vec::new(),
            }),
        })
    }

    pub fn num_pages(&self) -> i64 {
        self.inner.lock().num_pages
    }

    /// Reads exactly `PAGE_SIZE` bytes for `page_id`. A short read at
    /// end-of-file (expected after a crash mid-write) zero-fills the tail
    /// rather than failing.
    pub fn read_page(&self, page_id: PageId, out: &mut [u8]) -> Result<()> {
        debug_assert_eq!(out.len(), PAGE_SIZE);
        let mut inner = self.inner.lock();
        if page_id < 0 || page_id as i64 >= inner.num_pages {
            return Err(DbError::InvalidPageId(page_id));
        }
        let offset = page_id as u64 * PAGE_SIZE as u64;
        inner.file.seek(SeekFrom::Start(offset))?;

        let mut read_total = 0usize;
        loop {
            let n = inner.file.read(&mut out[read_total..])?;
            if n == 0 {
                break;
            }
            read_total += n;
            if read_total == out.len() {
                break;
            }
        }
        if read_total < out.len() {
            out[read_total..].fill(0);
        }
        Ok(())
    }

    /// Writes `PAGE_SIZE` bytes for `page_id`, extending the file if needed,
    /// and forces the write to stable storage before returning.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        if page_id < 0 {
            return Err(DbError::InvalidPageId(page_id));
        }
        let mut inner = self.inner.lock();
        let offset = page_id as u64 * PAGE_SIZE as u64;
        let required = offset + PAGE_SIZE as u64;
        let current_len = inner.file.metadata()?.len();
        if current_len < required {
            inner.file.set_len(required)?;
        }
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(data)?;
        inner.file.sync_data()?;

        if page_id as i64 >= inner.num_pages {
            inner.num_pages = page_id as i64 + 1;
            if inner.next_page_id <= page_id {
                inner.next_page_id = page_id + 1;
            }
        }
        Ok(())
    }

    /// Pops a free id if one exists, else allocates and bumps `next_page_id`.
    /// Ids are never reused while any frame still references them; that
    /// invariant is the caller's (the buffer pool's) responsibility — the
    /// disk manager is oblivious to frame state.
    pub fn allocate_page(&self) -> PageId {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.free_pages.pop() {
            return id;
        }
        let id = inner.next_page_id;
        inner.next_page_id += 1;
        if inner.num_pages < inner.next_page_id as i64 {
            inner.num_pages = inner.next_page_id as i64;
        }
        id
    }

    /// Pushes `page_id` onto the free list. No zeroing, no I/O.
    pub fn deallocate_page(&self, page_id: PageId) {
        let mut inner = self.inner.lock();
        if page_id >= 0 && (page_id as i64) < inner.next_page_id as i64 {
            inner.free_pages.push(page_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn disk(dir: &tempfile::TempDir) -> DiskManager {
        DiskManager::new(dir.path().join("data.db")).unwrap()
    }

    #[test]
    fn read_invalid_page_id_fails() {
        let dir = tempdir().unwrap();
        let dm = disk(&dir);
        let mut buf = [0u8; PAGE_SIZE];
        assert!(matches!(
            dm.read_page(-1, &mut buf),
            Err(DbError::InvalidPageId(-1))
        ));
        assert!(matches!(dm.read_page(0, &mut buf), Err(DbError::InvalidPageId(0))));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let dm = disk(&dir);
        let id = dm.allocate_page();
        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xAB;
        dm.write_page(id, &data).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        dm.read_page(id, &mut out).unwrap();
        assert_eq!(out[0], 0xAB);
    }

    #[test]
    fn allocate_reuses_freed_ids_lifo() {
        let dir = tempdir().unwrap();
        let dm = disk(&dir);
        let p1 = dm.allocate_page();
        let p2 = dm.allocate_page();
        let p3 = dm.allocate_page();
        dm.deallocate_page(p2);
        assert_eq!(dm.allocate_page(), p2);
        let _ = (p1, p3);
    }

    #[test]
    fn write_extends_file_and_updates_page_count() {
        let dir = tempdir().unwrap();
        let dm = disk(&dir);
        assert_eq!(dm.num_pages(), 0);
        let data = [0u8; PAGE_SIZE];
        dm.write_page(3, &data).unwrap();
        assert_eq!(dm.num_pages(), 4);
        // Pages 0..=2 were never explicitly written but are now in range;
        // reading them returns the zero-fill the file extension produced.
        let mut out = [0xFFu8; PAGE_SIZE];
        dm.read_page(1, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }
}
