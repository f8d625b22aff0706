//! RAII pin ownership.
//!
//! [`PinnedPage`] wraps one pin taken by `fetch_page` or `new_page` and
//! gives it back on drop, passing along whether the page was written.
//!
//! Content guards borrow the `PinnedPage`, so the borrow checker keeps them
//! from outliving the pin.

use tracing::warn;

use super::buffer_pool_manager::BufferPoolManager;
use super::page_handle::{PageHandle, PageReadGuard, PageWriteGuard};
use crate::common::{FrameId, PageId, Result};
use crate::storage::DiskManager;

/// A pinned page that unpins itself when dropped.
///
/// # Example
/// ```
/// use clockpool::{BufferPoolManager, MemoryDiskManager};
///
/// let bpm = BufferPoolManager::new(4, MemoryDiskManager::new(), None);
///
/// let page_id = {
///     let mut page = bpm.new_pinned().unwrap().unwrap();
///     page.write().unwrap().as_mut_slice()[0] = 0xAB;
///     page.page_id()
/// }; // unpinned here, marked dirty
///
/// assert_eq!(bpm.pin_count(page_id), Some(0));
/// assert_eq!(bpm.is_dirty(page_id), Some(true));
/// ```
pub struct PinnedPage<'a, D: DiskManager> {
    bpm: &'a BufferPoolManager<D>,
    handle: PageHandle<'a>,
    is_dirty: bool,
}

impl<'a, D: DiskManager> PinnedPage<'a, D> {
    pub(crate) fn new(bpm: &'a BufferPoolManager<D>, handle: PageHandle<'a>) -> Self {
        Self {
            bpm,
            handle,
            is_dirty: false,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.handle.page_id()
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.handle.frame_id()
    }

    /// Shared access to the content.
    pub fn read(&self) -> Result<PageReadGuard<'_>> {
        self.handle.read()
    }

    /// Exclusive access to the content. Marks the page dirty.
    pub fn write(&mut self) -> Result<PageWriteGuard<'_>> {
        let guard = self.handle.write()?;
        self.is_dirty = true;
        Ok(guard)
    }

    /// Report the page dirty on unpin without going through `write`.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Whether the page will be reported dirty on unpin.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }
}

impl<D: DiskManager> Drop for PinnedPage<'_, D> {
    fn drop(&mut self) {
        let page_id = self.handle.page_id();
        match self.bpm.unpin_page(page_id, self.is_dirty) {
            Ok(true) => {}
            Ok(false) => warn!(%page_id, "pinned page was not resident on drop"),
            Err(err) => warn!(%page_id, %err, "failed to unpin page on drop"),
        }
    }
}
