//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based protection against eviction
//! - Dirty page write-back on eviction and on flush
//! - CLOCK eviction of unpinned frames

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::frame::{Frame, FrameMeta};
use super::page_guard::PinnedPage;
use super::page_handle::PageHandle;
use super::replacer::ClockReplacer;
use super::stats::BufferPoolStats;
use crate::common::{BufferPoolConfig, Error, FrameId, PageId, Result};
use crate::recovery::LogManager;
use crate::storage::{DiskManager, FileDiskManager, Page};

/// Everything guarded by the pool latch.
struct PoolState<D> {
    /// Per-frame metadata, indexed by frame id.
    metas: Vec<FrameMeta>,
    /// Resident page -> frame holding it.
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page (LIFO).
    free_list: Vec<FrameId>,
    replacer: ClockReplacer,
    disk: D,
}

/// A flush in progress: the page is pinned and its copy not yet written.
struct FlushTicket {
    page_id: PageId,
    frame_id: FrameId,
    seq: u64,
}

/// Manages a fixed pool of frames caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌────────────────── Mutex<PoolState> ──────────────────┐   │
/// │  │ page_table    free_list    replacer    metas    disk │   │
/// │  │ PageId→Fid    Vec<Fid>     Clock      pin/dirty   D  │   │
/// │  └──────────────────────────────────────────────────────┘   │
/// │  ┌───────────────────────────────────────────────────────┐  │
/// │  │  frames: Vec<Frame>   [Frame0] [Frame1] [Frame2] ...  │  │
/// │  └───────────────────────────────────────────────────────┘  │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// Every operation runs under a single latch that covers the page table,
/// free list, replacer, frame metadata and the disk manager. Disk I/O happens
/// while the latch is held, so it is serialized across all callers.
///
/// Page content sits outside the latch in each frame's `RwLock`. A positive
/// pin count is what keeps a frame from being evicted underneath a caller.
/// While holding the latch the pool only locks the content of unpinned
/// frames (eviction, loading, delete). Flushing, which may hit pinned pages,
/// copies content with the latch released. A caller may therefore hold one
/// page's guard while fetching another, as long as guards are dropped
/// before their page is unpinned.
///
/// # Usage
/// ```
/// use clockpool::{BufferPoolManager, MemoryDiskManager};
///
/// let bpm = BufferPoolManager::new(8, MemoryDiskManager::new(), None);
///
/// // New pages come back pinned once.
/// let handle = bpm.new_page()?.expect("pool has free frames");
/// let page_id = handle.page_id();
/// handle.write()?.as_mut_slice()[0] = 0xAB;
/// assert!(bpm.unpin_page(page_id, true)?);
///
/// let handle = bpm.fetch_page(page_id)?.expect("page is resident");
/// assert_eq!(handle.read()?.as_slice()[0], 0xAB);
/// bpm.unpin_page(page_id, false)?;
/// # Ok::<(), clockpool::Error>(())
/// ```
pub struct BufferPoolManager<D: DiskManager = FileDiskManager> {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    state: Mutex<PoolState<D>>,

    /// Carried for recovery-aware callers; the pool never calls it.
    log_manager: Option<Arc<LogManager>>,

    stats: BufferPoolStats,

    pool_size: usize,
}

impl<D: DiskManager> BufferPoolManager<D> {
    /// Create a new buffer pool manager.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: D, log_manager: Option<Arc<LogManager>>) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();

        // Reversed so that frame 0 is handed out first.
        let free_list: Vec<FrameId> = FrameId::all(pool_size).rev().collect();

        debug!(pool_size, "buffer pool created");

        Self {
            frames,
            state: Mutex::new(PoolState {
                metas: vec![FrameMeta::empty(); pool_size],
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                replacer: ClockReplacer::new(pool_size),
                disk: disk_manager,
            }),
            log_manager,
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    /// Create a buffer pool manager from a validated configuration.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the configuration is rejected.
    pub fn from_config(
        config: &BufferPoolConfig,
        disk_manager: D,
        log_manager: Option<Arc<LogManager>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.pool_size, disk_manager, log_manager))
    }

    // ========================================================================
    // Public API: page operations
    // ========================================================================

    /// Pin `page_id` and return a handle to its content, reading it from
    /// disk if it is not resident.
    ///
    /// Returns `Ok(None)` when the page is not resident and every frame is
    /// pinned.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for `PageId::INVALID`
    /// - Disk errors from writing back a dirty victim or reading the page
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<PageHandle<'_>>> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.metas[frame_id.index()].pin_count += 1;
            state.replacer.pin(frame_id);
            BufferPoolStats::bump(&self.stats.cache_hits);
            trace!(%page_id, %frame_id, "cache hit");
            return Ok(Some(self.handle(frame_id, page_id)));
        }

        BufferPoolStats::bump(&self.stats.cache_misses);

        let Some(frame_id) = self.acquire_frame(state)? else {
            debug!(%page_id, "fetch failed: every frame is pinned");
            return Ok(None);
        };

        let frame = &self.frames[frame_id.index()];
        let mut content = frame.page_mut();
        let generation = frame.advance_generation(&mut content);
        content.reset();
        state.metas[frame_id.index()].reset(page_id);
        state.page_table.insert(page_id, frame_id);

        if let Err(err) = state.disk.read_page(page_id, &mut content) {
            state.page_table.remove(&page_id);
            state.metas[frame_id.index()].reset(PageId::INVALID);
            state.free_list.push(frame_id);
            return Err(err);
        }
        drop(content);
        BufferPoolStats::bump(&self.stats.pages_read);

        state.metas[frame_id.index()].pin_count = 1;
        state.replacer.pin(frame_id);
        debug!(%page_id, %frame_id, "loaded page from disk");

        Ok(Some(PageHandle::new(frame, frame_id, page_id, generation)))
    }

    /// Drop one pin on `page_id`, OR-ing `is_dirty` into its dirty flag.
    ///
    /// When the pin count reaches zero the frame becomes evictable. Returns
    /// `Ok(false)` if the page is not resident.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the page is resident with a pin count of
    /// zero. Nothing is changed in that case.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };

        let meta = &mut state.metas[frame_id.index()];
        if !meta.is_pinned() {
            warn!(%page_id, "unpin of a page with no outstanding pins");
            return Err(Error::PageNotPinned(page_id));
        }

        meta.pin_count -= 1;
        meta.is_dirty |= is_dirty;
        if meta.pin_count == 0 {
            state.replacer.unpin(frame_id);
            trace!(%page_id, %frame_id, "frame evictable");
        }

        Ok(true)
    }

    /// Write `page_id` to disk whether or not it is dirty, and clear its
    /// dirty flag. Residency is untouched.
    ///
    /// The content is copied without the pool latch, so a caller holding the
    /// page's write guard only delays this flush; it never blocks other pool
    /// operations. The page carries one extra pin while the flush runs.
    ///
    /// Returns `Ok(false)` if the page is not resident.
    ///
    /// # Errors
    /// Disk errors from the write. The page is marked dirty again.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let ticket = self.begin_flush(&mut self.state.lock(), page_id);
        let Some(ticket) = ticket else {
            return Ok(false);
        };
        self.finish_flush(ticket)?;
        Ok(true)
    }

    /// Allocate a fresh page and return it pinned once, with zeroed content.
    ///
    /// Returns `Ok(None)` if every frame is pinned; no page id is allocated
    /// in that case.
    ///
    /// # Errors
    /// Disk errors from allocation or from writing back a dirty victim.
    pub fn new_page(&self) -> Result<Option<PageHandle<'_>>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.free_list.is_empty() && state.replacer.size() == 0 {
            debug!("new page failed: every frame is pinned");
            return Ok(None);
        }

        let page_id = state.disk.allocate_page()?;
        BufferPoolStats::bump(&self.stats.pages_allocated);

        let frame_id = match self.acquire_frame(state) {
            Ok(Some(frame_id)) => frame_id,
            outcome => {
                if let Err(err) = state.disk.deallocate_page(page_id) {
                    warn!(%page_id, %err, "failed to release page id after new page failed");
                } else {
                    BufferPoolStats::bump(&self.stats.pages_deallocated);
                }
                return outcome.map(|_| None);
            }
        };

        let frame = &self.frames[frame_id.index()];
        let generation = {
            let mut content = frame.page_mut();
            let generation = frame.advance_generation(&mut content);
            content.reset();
            generation
        };

        let meta = &mut state.metas[frame_id.index()];
        meta.reset(page_id);
        meta.pin_count = 1;
        state.page_table.insert(page_id, frame_id);
        state.replacer.pin(frame_id);
        debug!(%page_id, %frame_id, "new page");

        Ok(Some(PageHandle::new(frame, frame_id, page_id, generation)))
    }

    /// Remove `page_id` from the pool and release its id on disk.
    ///
    /// Returns `Ok(true)` if the page was deleted or was not resident, and
    /// `Ok(false)` if it is pinned. A dirty page is discarded without being
    /// written back.
    ///
    /// # Errors
    /// Disk errors from deallocation; the page stays resident in that case.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };

        if state.metas[frame_id.index()].is_pinned() {
            debug!(%page_id, "delete refused: page is pinned");
            return Ok(false);
        }

        state.disk.deallocate_page(page_id)?;
        BufferPoolStats::bump(&self.stats.pages_deallocated);

        {
            let frame = &self.frames[frame_id.index()];
            let mut content = frame.page_mut();
            frame.advance_generation(&mut content);
            content.reset();
        }

        state.replacer.pin(frame_id);
        state.page_table.remove(&page_id);
        state.metas[frame_id.index()].reset(PageId::INVALID);
        state.free_list.push(frame_id);
        debug!(%page_id, %frame_id, "deleted page");

        Ok(true)
    }

    /// Flush every resident page, in no particular order.
    ///
    /// Every page is attempted; the first disk error is returned.
    pub fn flush_all_pages(&self) -> Result<()> {
        let tickets: Vec<FlushTicket> = {
            let mut guard = self.state.lock();
            let resident: Vec<PageId> = guard.page_table.keys().copied().collect();
            resident
                .into_iter()
                .filter_map(|page_id| self.begin_flush(&mut guard, page_id))
                .collect()
        };

        let pages = tickets.len();
        let mut first_err = None;
        for ticket in tickets {
            if let Err(err) = self.finish_flush(ticket) {
                first_err.get_or_insert(err);
            }
        }

        debug!(pages, "flushed all pages");
        first_err.map_or(Ok(()), Err)
    }

    // ========================================================================
    // Public API: RAII pins
    // ========================================================================

    /// [`fetch_page`](Self::fetch_page), wrapped so the pin is released on drop.
    pub fn fetch_pinned(&self, page_id: PageId) -> Result<Option<PinnedPage<'_, D>>> {
        Ok(self
            .fetch_page(page_id)?
            .map(|handle| PinnedPage::new(self, handle)))
    }

    /// [`new_page`](Self::new_page), wrapped so the pin is released on drop.
    pub fn new_pinned(&self) -> Result<Option<PinnedPage<'_, D>>> {
        Ok(self.new_page()?.map(|handle| PinnedPage::new(self, handle)))
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// The log manager handle this pool was built with.
    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Get the number of resident pages.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Get the number of frames the replacer may evict.
    pub fn evictable_count(&self) -> usize {
        self.state.lock().replacer.size()
    }

    /// Pin count of `page_id`, or `None` if it is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let frame_id = state.page_table.get(&page_id)?;
        Some(state.metas[frame_id.index()].pin_count)
    }

    /// Dirty flag of `page_id`, or `None` if it is not resident.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        let frame_id = state.page_table.get(&page_id)?;
        Some(state.metas[frame_id.index()].is_dirty)
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn handle(&self, frame_id: FrameId, page_id: PageId) -> PageHandle<'_> {
        let frame = &self.frames[frame_id.index()];
        PageHandle::new(frame, frame_id, page_id, frame.generation())
    }

    /// Take a frame from the free list, else evict the replacer's victim.
    ///
    /// The returned frame is out of the page table and the replacer. Its
    /// metadata still has to be reset by the caller.
    fn acquire_frame(&self, state: &mut PoolState<D>) -> Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = state.replacer.victim() else {
            return Ok(None);
        };

        let meta = &mut state.metas[frame_id.index()];
        let victim = meta.page_id;
        debug_assert!(!meta.is_pinned(), "replacer chose pinned {frame_id}");

        if meta.is_dirty {
            if let Err(err) = self.write_back(&mut state.disk, frame_id, meta) {
                // Victim stays resident and evictable.
                state.replacer.unpin(frame_id);
                return Err(err);
            }
            BufferPoolStats::bump(&self.stats.dirty_writebacks);
        }

        state.page_table.remove(&victim);
        BufferPoolStats::bump(&self.stats.evictions);
        debug!(page_id = %victim, %frame_id, "evicted page");

        Ok(Some(frame_id))
    }

    /// Write an unpinned victim's content to disk and mark it clean.
    ///
    /// Only for frames nobody has pinned, so the content lock is free.
    fn write_back(&self, disk: &mut D, frame_id: FrameId, meta: &mut FrameMeta) -> Result<()> {
        let content = self.frames[frame_id.index()].page();
        disk.write_page(meta.page_id, &content)?;
        drop(content);

        meta.is_dirty = false;
        BufferPoolStats::bump(&self.stats.pages_written);
        trace!(page_id = %meta.page_id, %frame_id, "wrote page to disk");
        Ok(())
    }

    /// First half of a flush, under the latch: pin the page so it stays put
    /// and clear its dirty flag. Writers that unpin after this point set the
    /// flag again, so nothing they write can be lost.
    fn begin_flush(&self, state: &mut PoolState<D>, page_id: PageId) -> Option<FlushTicket> {
        let &frame_id = state.page_table.get(&page_id)?;
        state.replacer.pin(frame_id);

        let meta = &mut state.metas[frame_id.index()];
        meta.pin_count += 1;
        meta.is_dirty = false;
        meta.flush_seq += 1;

        Some(FlushTicket {
            page_id,
            frame_id,
            seq: meta.flush_seq,
        })
    }

    /// Second half of a flush: copy the content without the latch, then
    /// write it and drop the flush pin under the latch.
    ///
    /// A copy is written only if no later-started flush has reached disk
    /// first, since that one saw at least as much of the page.
    fn finish_flush(&self, ticket: FlushTicket) -> Result<()> {
        let FlushTicket {
            page_id,
            frame_id,
            seq,
        } = ticket;

        let mut copy = Page::new();
        copy.as_mut_slice()
            .copy_from_slice(self.frames[frame_id.index()].page().as_slice());

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let meta = &mut state.metas[frame_id.index()];
        debug_assert_eq!(meta.page_id, page_id, "flush pin did not hold {frame_id}");

        let result = if seq > meta.written_seq {
            match state.disk.write_page(page_id, &copy) {
                Ok(()) => {
                    meta.written_seq = seq;
                    BufferPoolStats::bump(&self.stats.pages_written);
                    trace!(%page_id, %frame_id, "flushed page");
                    Ok(())
                }
                Err(err) => {
                    meta.is_dirty = true;
                    Err(err)
                }
            }
        } else {
            trace!(%page_id, "newer flush already on disk");
            Ok(())
        };

        meta.pin_count -= 1;
        if meta.pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
        result
    }

    /// Panic if the pool's bookkeeping is inconsistent.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        use std::collections::HashSet;

        let state = self.state.lock();
        let mut seen_frames = HashSet::new();

        for (&page_id, &frame_id) in &state.page_table {
            assert!(seen_frames.insert(frame_id), "{frame_id} mapped twice");
            let meta = state.metas[frame_id.index()];
            assert_eq!(meta.page_id, page_id);
            assert_eq!(
                state.replacer.is_evictable(frame_id),
                !meta.is_pinned(),
                "{page_id} in {frame_id}: evictable iff unpinned"
            );
        }

        for &frame_id in &state.free_list {
            assert!(seen_frames.insert(frame_id), "{frame_id} both free and resident");
            assert!(!state.replacer.is_evictable(frame_id));
            assert_eq!(state.metas[frame_id.index()], FrameMeta::empty());
        }

        assert_eq!(seen_frames.len(), self.pool_size, "frame leaked");
    }
}

impl<D: DiskManager> fmt::Debug for BufferPoolManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BufferPoolManager")
            .field("pool_size", &self.pool_size)
            .field("resident", &state.page_table.len())
            .field("free", &state.free_list.len())
            .field("evictable", &state.replacer.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDiskManager;
    use proptest::prelude::*;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager<MemoryDiskManager>, MemoryDiskManager) {
        let disk = MemoryDiskManager::new();
        (BufferPoolManager::new(pool_size, disk.clone(), None), disk)
    }

    /// Allocate a page through the pool and leave it unpinned.
    fn new_unpinned(bpm: &BufferPoolManager<MemoryDiskManager>, fill: u8) -> PageId {
        let handle = bpm.new_page().unwrap().unwrap();
        handle.write().unwrap().as_mut_slice()[0] = fill;
        let page_id = handle.page_id();
        assert!(bpm.unpin_page(page_id, true).unwrap());
        page_id
    }

    #[test]
    fn test_new_page_is_pinned_once() {
        let (bpm, disk) = create_bpm(4);

        let handle = bpm.new_page().unwrap().unwrap();
        let page_id = handle.page_id();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(handle.frame_id(), FrameId::new(0));
        assert_eq!(bpm.pin_count(page_id), Some(1));
        assert_eq!(bpm.is_dirty(page_id), Some(false));
        assert_eq!(bpm.evictable_count(), 0);
        assert_eq!(disk.counts().allocations, 1);
        assert_eq!(disk.counts().reads, 0);

        assert!(handle.read().unwrap().as_slice().iter().all(|&b| b == 0));
        bpm.check_invariants();
    }

    #[test]
    fn test_fetch_resident_page_is_a_hit() {
        let (bpm, disk) = create_bpm(4);
        let page_id = new_unpinned(&bpm, 0x11);

        let first = bpm.fetch_page(page_id).unwrap().unwrap();
        let second = bpm.fetch_page(page_id).unwrap().unwrap();

        assert_eq!(first.frame_id(), second.frame_id());
        assert_eq!(bpm.pin_count(page_id), Some(2));
        assert_eq!(disk.counts().reads, 0);
        assert_eq!(bpm.stats().snapshot().cache_hits, 2);
        assert_eq!(bpm.evictable_count(), 0);
        bpm.check_invariants();
    }

    #[test]
    fn test_unpin_makes_evictable_only_at_zero() {
        let (bpm, _disk) = create_bpm(4);
        let page_id = new_unpinned(&bpm, 1);
        bpm.fetch_page(page_id).unwrap().unwrap();
        bpm.fetch_page(page_id).unwrap().unwrap();

        assert!(bpm.unpin_page(page_id, false).unwrap());
        assert_eq!(bpm.evictable_count(), 0);
        assert!(bpm.unpin_page(page_id, false).unwrap());
        assert_eq!(bpm.evictable_count(), 1);
        bpm.check_invariants();
    }

    #[test]
    fn test_unpin_dirty_flag_is_sticky() {
        let (bpm, _disk) = create_bpm(4);
        let handle = bpm.new_page().unwrap().unwrap();
        let page_id = handle.page_id();
        bpm.fetch_page(page_id).unwrap().unwrap();

        bpm.unpin_page(page_id, true).unwrap();
        bpm.unpin_page(page_id, false).unwrap();
        assert_eq!(bpm.is_dirty(page_id), Some(true));
    }

    #[test]
    fn test_unpin_underflow_is_rejected() {
        let (bpm, _disk) = create_bpm(2);
        let page_id = new_unpinned(&bpm, 0);

        assert!(matches!(
            bpm.unpin_page(page_id, false),
            Err(Error::PageNotPinned(pid)) if pid == page_id
        ));
        assert_eq!(bpm.pin_count(page_id), Some(0));
        assert_eq!(bpm.evictable_count(), 1);
        bpm.check_invariants();
    }

    #[test]
    fn test_unpin_not_resident() {
        let (bpm, _disk) = create_bpm(2);
        assert!(!bpm.unpin_page(PageId::new(9), true).unwrap());
        assert!(!bpm.unpin_page(PageId::INVALID, false).unwrap());
    }

    #[test]
    fn test_fetch_invalid_page_id() {
        let (bpm, _disk) = create_bpm(2);
        assert!(matches!(
            bpm.fetch_page(PageId::INVALID),
            Err(Error::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_free_list_preferred_over_victim() {
        let (bpm, disk) = create_bpm(3);
        let p0 = new_unpinned(&bpm, 0xA0);
        assert_eq!(bpm.evictable_count(), 1);

        // Two free frames remain; neither new page may evict p0.
        new_unpinned(&bpm, 0xA1);
        new_unpinned(&bpm, 0xA2);

        assert_eq!(bpm.pin_count(p0), Some(0));
        assert_eq!(bpm.stats().snapshot().evictions, 0);
        assert_eq!(disk.counts().writes, 0);
        bpm.check_invariants();
    }

    #[test]
    fn test_fetch_fails_when_all_pinned() {
        let (bpm, disk) = create_bpm(1);
        let _a = bpm.new_page().unwrap().unwrap();
        let b = {
            let mut d = disk.clone();
            d.allocate_page().unwrap()
        };

        assert!(bpm.fetch_page(b).unwrap().is_none());
        assert!(bpm.new_page().unwrap().is_none());
        // No page id leaked by the failed new_page.
        assert_eq!(disk.counts().allocations, 2);
        bpm.check_invariants();
    }

    #[test]
    fn test_dirty_victim_written_before_reuse() {
        let (bpm, disk) = create_bpm(1);
        let p0 = new_unpinned(&bpm, 0x42);

        let p1 = bpm.new_page().unwrap().unwrap().page_id();
        assert_eq!(disk.write_log(), vec![(p0, 0x42)]);
        assert_eq!(bpm.pin_count(p0), None);

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.dirty_writebacks, 1);

        bpm.unpin_page(p1, false).unwrap();
        let handle = bpm.fetch_page(p0).unwrap().unwrap();
        assert_eq!(handle.read().unwrap().as_slice()[0], 0x42);
        // p1 was clean, so it was dropped without a write.
        assert_eq!(disk.counts().writes, 1);
    }

    #[test]
    fn test_stale_handle_after_eviction() {
        let (bpm, _disk) = create_bpm(1);
        let handle = bpm.new_page().unwrap().unwrap();
        bpm.unpin_page(handle.page_id(), false).unwrap();

        let other = bpm.new_page().unwrap().unwrap();
        assert_eq!(other.frame_id(), handle.frame_id());

        assert!(!handle.is_current());
        assert!(matches!(handle.read(), Err(Error::StaleHandle { .. })));
        assert!(other.read().is_ok());
    }

    #[test]
    fn test_flush_page_writes_even_if_clean_and_pinned() {
        let (bpm, disk) = create_bpm(2);
        let handle = bpm.new_page().unwrap().unwrap();
        let page_id = handle.page_id();

        assert!(bpm.flush_page(page_id).unwrap());
        assert_eq!(disk.counts().writes, 1);
        assert_eq!(bpm.pin_count(page_id), Some(1));

        handle.write().unwrap().as_mut_slice()[0] = 7;
        bpm.unpin_page(page_id, true).unwrap();
        assert!(bpm.flush_page(page_id).unwrap());
        assert_eq!(bpm.is_dirty(page_id), Some(false));
        assert_eq!(disk.page_content(page_id).unwrap()[0], 7);

        assert!(!bpm.flush_page(PageId::new(99)).unwrap());
    }

    #[test]
    fn test_failed_flush_keeps_page_dirty() {
        let (bpm, disk) = create_bpm(2);
        let page_id = new_unpinned(&bpm, 0x31);

        disk.set_fail_writes(true);
        assert!(matches!(bpm.flush_page(page_id), Err(Error::Io(_))));
        assert_eq!(bpm.is_dirty(page_id), Some(true));
        // The flush pin is gone again.
        assert_eq!(bpm.pin_count(page_id), Some(0));
        assert_eq!(bpm.evictable_count(), 1);
        bpm.check_invariants();

        disk.set_fail_writes(false);
        assert!(bpm.flush_page(page_id).unwrap());
        assert_eq!(bpm.is_dirty(page_id), Some(false));
        assert_eq!(disk.page_content(page_id).unwrap()[0], 0x31);
    }

    #[test]
    fn test_earlier_flush_skipped_after_later_one_lands() {
        let (bpm, disk) = create_bpm(2);
        let handle = bpm.new_page().unwrap().unwrap();
        let page_id = handle.page_id();

        let earlier = bpm.begin_flush(&mut bpm.state.lock(), page_id).unwrap();
        let later = bpm.begin_flush(&mut bpm.state.lock(), page_id).unwrap();
        assert_eq!(bpm.pin_count(page_id), Some(3));

        handle.write().unwrap().as_mut_slice()[0] = 2;
        bpm.finish_flush(later).unwrap();
        bpm.finish_flush(earlier).unwrap();

        assert_eq!(disk.counts().writes, 1);
        assert_eq!(disk.page_content(page_id).unwrap()[0], 2);
        assert_eq!(bpm.pin_count(page_id), Some(1));
        bpm.check_invariants();
    }

    #[test]
    fn test_delete_page() {
        let (bpm, disk) = create_bpm(2);
        let handle = bpm.new_page().unwrap().unwrap();
        let page_id = handle.page_id();

        assert!(!bpm.delete_page(page_id).unwrap());
        bpm.unpin_page(page_id, true).unwrap();
        assert!(bpm.delete_page(page_id).unwrap());

        assert_eq!(bpm.pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 2);
        assert_eq!(bpm.evictable_count(), 0);
        assert!(!handle.is_current());
        // Deleted dirty content is discarded, and the id released.
        assert_eq!(disk.counts().writes, 0);
        assert_eq!(disk.counts().deallocations, 1);
        bpm.check_invariants();

        // Not resident: no-op success.
        assert!(bpm.delete_page(PageId::new(77)).unwrap());
        assert_eq!(disk.counts().deallocations, 1);
    }

    #[test]
    fn test_deleted_frame_reused_by_next_new_page() {
        let (bpm, _disk) = create_bpm(3);
        let a = new_unpinned(&bpm, 1);
        let _b = bpm.new_page().unwrap().unwrap();
        let frame_a = bpm.fetch_page(a).unwrap().unwrap().frame_id();
        bpm.unpin_page(a, false).unwrap();

        assert!(bpm.delete_page(a).unwrap());
        let next = bpm.new_page().unwrap().unwrap();
        assert_eq!(next.frame_id(), frame_a);
    }

    #[test]
    fn test_failed_read_returns_frame() {
        let (bpm, disk) = create_bpm(2);

        assert!(matches!(
            bpm.fetch_page(PageId::new(5)),
            Err(Error::PageNotFound(_))
        ));
        assert_eq!(bpm.free_frame_count(), 2);
        assert_eq!(bpm.page_count(), 0);

        let page_id = disk.clone().allocate_page().unwrap();
        disk.set_fail_reads(true);
        assert!(matches!(bpm.fetch_page(page_id), Err(Error::Io(_))));
        assert_eq!(bpm.pin_count(page_id), None);
        bpm.check_invariants();

        disk.set_fail_reads(false);
        assert!(bpm.fetch_page(page_id).unwrap().is_some());
        assert_eq!(bpm.pin_count(page_id), Some(1));
    }

    #[test]
    fn test_failed_writeback_keeps_victim() {
        let (bpm, disk) = create_bpm(1);
        let p0 = new_unpinned(&bpm, 0x99);

        disk.set_fail_writes(true);
        assert!(matches!(bpm.new_page(), Err(Error::Io(_))));

        // Victim still resident, dirty and evictable; allocated id released.
        assert_eq!(bpm.pin_count(p0), Some(0));
        assert_eq!(bpm.is_dirty(p0), Some(true));
        assert_eq!(bpm.evictable_count(), 1);
        assert_eq!(disk.counts().deallocations, 1);
        bpm.check_invariants();

        disk.set_fail_writes(false);
        let p1 = bpm.new_page().unwrap().unwrap().page_id();
        assert_ne!(p1, p0);
        assert_eq!(disk.page_content(p0).unwrap()[0], 0x99);
    }

    #[test]
    fn test_flush_all_pages() {
        let (bpm, disk) = create_bpm(8);
        let ids: Vec<PageId> = (0..5).map(|i| new_unpinned(&bpm, i)).collect();

        bpm.flush_all_pages().unwrap();

        assert_eq!(disk.counts().writes, 5);
        for (i, &pid) in ids.iter().enumerate() {
            assert_eq!(bpm.is_dirty(pid), Some(false));
            assert_eq!(disk.page_content(pid).unwrap()[0], i as u8);
        }
    }

    #[test]
    fn test_log_manager_is_threaded_through() {
        let log = Arc::new(LogManager::new());
        let bpm = BufferPoolManager::new(2, MemoryDiskManager::new(), Some(Arc::clone(&log)));
        assert!(Arc::ptr_eq(bpm.log_manager().unwrap(), &log));

        let handle = bpm.new_page().unwrap().unwrap();
        handle.set_lsn(log.next_lsn()).unwrap();
        assert_eq!(handle.lsn().unwrap(), 1);

        let (plain, _) = create_bpm(1);
        assert!(plain.log_manager().is_none());
    }

    #[test]
    fn test_from_config() {
        let config = BufferPoolConfig { pool_size: 3 };
        let bpm = BufferPoolManager::from_config(&config, MemoryDiskManager::new(), None).unwrap();
        assert_eq!(bpm.pool_size(), 3);
        assert_eq!(bpm.free_frame_count(), 3);

        let bad = BufferPoolConfig { pool_size: 0 };
        assert!(matches!(
            BufferPoolManager::from_config(&bad, MemoryDiskManager::new(), None),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    #[should_panic(expected = "pool_size must be > 0")]
    fn test_zero_pool_size_panics() {
        BufferPoolManager::new(0, MemoryDiskManager::new(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        New,
        Fetch(usize),
        Unpin(usize, bool),
        Flush(usize),
        Delete(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::New),
            (0..16usize).prop_map(Op::Fetch),
            (0..16usize, any::<bool>()).prop_map(|(i, d)| Op::Unpin(i, d)),
            (0..16usize).prop_map(Op::Flush),
            (0..16usize).prop_map(Op::Delete),
        ]
    }

    proptest! {
        /// Random operation sequences keep the bookkeeping consistent, and
        /// every live page reads back the byte written when it was created.
        #[test]
        fn prop_pool_invariants(ops in prop::collection::vec(op_strategy(), 1..120)) {
            let (bpm, _disk) = create_bpm(4);
            let mut live: Vec<PageId> = Vec::new();
            let mut expected: HashMap<PageId, u8> = HashMap::new();
            let mut pins: HashMap<PageId, u32> = HashMap::new();
            let mut counter = 0u8;

            for op in ops {
                match op {
                    Op::New => {
                        if let Some(handle) = bpm.new_page().unwrap() {
                            let pid = handle.page_id();
                            counter = counter.wrapping_add(1);
                            handle.write().unwrap().as_mut_slice()[0] = counter;
                            // Durable right away, so later clean unpins lose nothing.
                            prop_assert!(bpm.flush_page(pid).unwrap());
                            live.push(pid);
                            expected.insert(pid, counter);
                            pins.insert(pid, 1);
                        }
                    }
                    Op::Fetch(i) if !live.is_empty() => {
                        let pid = live[i % live.len()];
                        if let Some(handle) = bpm.fetch_page(pid).unwrap() {
                            prop_assert_eq!(handle.read().unwrap().as_slice()[0], expected[&pid]);
                            *pins.entry(pid).or_default() += 1;
                        }
                    }
                    Op::Unpin(i, dirty) if !live.is_empty() => {
                        let pid = live[i % live.len()];
                        let pinned = pins.get(&pid).copied().unwrap_or(0);
                        let result = bpm.unpin_page(pid, dirty);
                        if pinned > 0 {
                            prop_assert!(result.unwrap());
                            pins.insert(pid, pinned - 1);
                        } else {
                            prop_assert!(!matches!(result, Ok(true)));
                        }
                    }
                    Op::Flush(i) if !live.is_empty() => {
                        let pid = live[i % live.len()];
                        let resident = bpm.pin_count(pid).is_some();
                        prop_assert_eq!(bpm.flush_page(pid).unwrap(), resident);
                    }
                    Op::Delete(i) if !live.is_empty() => {
                        let idx = i % live.len();
                        let pid = live[idx];
                        let resident = bpm.pin_count(pid).is_some();
                        let pinned = pins.get(&pid).copied().unwrap_or(0);

                        let deleted = bpm.delete_page(pid).unwrap();
                        prop_assert_eq!(deleted, pinned == 0);

                        // A non-resident delete is a no-op; the page lives on.
                        if deleted && resident {
                            live.swap_remove(idx);
                            expected.remove(&pid);
                            pins.remove(&pid);
                        }
                    }
                    _ => {}
                }

                bpm.check_invariants();
                let pinned_pages = pins.values().filter(|&&p| p > 0).count();
                prop_assert_eq!(
                    bpm.evictable_count() + bpm.free_frame_count() + pinned_pages,
                    bpm.pool_size()
                );
            }
        }
    }
}
