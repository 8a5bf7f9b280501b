//! The page frame: a fixed-size byte buffer under its own latch.
//!
//! A frame is a passive value type; copying its bytes is not exposed.
//! The latch here protects only **content** — page id, pin count, dirty
//! flag, and page-LSN are metadata owned by the buffer pool and are never
//! stored on `Frame` itself (see `storage::buffer::FrameMeta`).

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PAGE_SIZE;

pub struct Frame {
    content: RwLock<Box<[u8]>>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            content: RwLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice()),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.content.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.content.write()
    }

    pub fn copy_from_slice(&self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), PAGE_SIZE);
        self.content.write().copy_from_slice(bytes);
    }

    pub fn zero(&self) {
        self.content.write().fill(0);
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
