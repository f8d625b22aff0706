//! Frame store slots.
//!
//! A [`Frame`] owns one page's worth of memory for the lifetime of the pool.
//! Its bookkeeping is split in two:
//! - [`Frame`] holds what page handles touch without the pool latch: the
//!   content lock, the generation stamp, and the page LSN.
//! - [`FrameMeta`] holds what only the pool touches under its latch: which
//!   page is resident, the pin count, the dirty flag, and flush ordering.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::recovery::{Lsn, INVALID_LSN};
use crate::storage::Page;

/// A slot in the frame store.
///
/// The generation increases every time the frame is given to a different
/// page (or emptied). A handle remembers the generation it was issued
/// under; a mismatch means the handle is stale. The pool only bumps the
/// generation while holding the content write lock, so a reader that holds
/// the content lock sees a stable generation.
pub struct Frame {
    page: RwLock<Page>,
    generation: AtomicU64,
    lsn: AtomicU64,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            generation: AtomicU64::new(0),
            lsn: AtomicU64::new(INVALID_LSN),
        }
    }

    /// Acquire read lock on the page content.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page content.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Current generation stamp.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation, clearing the LSN. Returns the new stamp.
    ///
    /// Caller must hold the content write lock (passed in as proof).
    pub(crate) fn advance_generation(&self, _content: &mut RwLockWriteGuard<'_, Page>) -> u64 {
        self.lsn.store(INVALID_LSN, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// LSN of the last logged change to the resident page.
    #[inline]
    pub fn lsn(&self) -> Lsn {
        self.lsn.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_lsn(&self, lsn: Lsn) {
        self.lsn.store(lsn, Ordering::Release);
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool-side metadata of a frame, guarded by the pool latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameMeta {
    /// Resident page, or `PageId::INVALID` when the frame is free.
    pub page_id: PageId,
    pub pin_count: u32,
    pub is_dirty: bool,
    /// Last flush started on this frame.
    pub flush_seq: u64,
    /// Flush whose copy last reached disk; older copies are dropped.
    pub written_seq: u64,
}

impl FrameMeta {
    pub fn empty() -> Self {
        Self {
            page_id: PageId::INVALID,
            pin_count: 0,
            is_dirty: false,
            flush_seq: 0,
            written_seq: 0,
        }
    }

    /// Take the frame over for `page_id`: unpinned and clean.
    pub fn reset(&mut self, page_id: PageId) {
        self.page_id = page_id;
        self.pin_count = 0;
        self.is_dirty = false;
        self.flush_seq = 0;
        self.written_seq = 0;
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }
}
