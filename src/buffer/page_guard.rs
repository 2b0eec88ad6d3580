use std::ops::{Deref, DerefMut};

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::common::PageId;
use crate::storage::page::HeapPage;

/// RAII guard for read access to a resident page.
///
/// Holds the page's in-memory latch until dropped. The transactional lock that
/// was taken to obtain the guard stays held until commit or abort.
pub struct PageGuard {
    page_id: PageId,
    guard: ArcRwLockReadGuard<RawRwLock, HeapPage>,
}

impl PageGuard {
    pub(crate) fn new(page_id: PageId, guard: ArcRwLockReadGuard<RawRwLock, HeapPage>) -> Self {
        Self { page_id, guard }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageGuard {
    type Target = HeapPage;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// RAII guard for in-place mutation of a resident page.
/// Only the buffer pool's own mutation paths hand these out.
pub(crate) struct PageWriteGuard {
    guard: ArcRwLockWriteGuard<RawRwLock, HeapPage>,
}

impl PageWriteGuard {
    pub(crate) fn new(guard: ArcRwLockWriteGuard<RawRwLock, HeapPage>) -> Self {
        Self { guard }
    }
}

impl Deref for PageWriteGuard {
    type Target = HeapPage;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageWriteGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
