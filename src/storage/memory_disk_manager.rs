//! In-memory disk manager that records the traffic it sees.

use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::disk_manager::DiskManager;
use crate::storage::page::Page;

/// Counters of the calls a [`MemoryDiskManager`] has served.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiskIoCounts {
    pub reads: u64,
    pub writes: u64,
    pub allocations: u64,
    pub deallocations: u64,
}

#[derive(Default)]
struct MemoryState {
    pages: Vec<Box<[u8]>>,
    free_ids: BTreeSet<u32>,
    counts: DiskIoCounts,
    /// Every successful `write_page`, in order, with the first byte written.
    write_log: Vec<(PageId, u8)>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryState {
    fn check_allocated(&self, page_id: PageId) -> Result<usize> {
        let idx = page_id.0 as usize;
        if !page_id.is_valid() || idx >= self.pages.len() || self.free_ids.contains(&page_id.0) {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(idx)
    }
}

/// A [`DiskManager`] backed by memory.
///
/// Clones share the same store, so a test can hand one clone to a buffer
/// pool and keep another to inspect what the pool read and wrote. Read and
/// write failures can be injected to exercise error paths.
///
/// # Example
/// ```
/// use clockpool::{BufferPoolManager, MemoryDiskManager};
///
/// let disk = MemoryDiskManager::new();
/// let bpm = BufferPoolManager::new(4, disk.clone(), None);
///
/// let handle = bpm.new_page().unwrap().unwrap();
/// let page_id = handle.page_id();
/// bpm.unpin_page(page_id, true).unwrap();
/// bpm.flush_page(page_id).unwrap();
///
/// assert_eq!(disk.counts().writes, 1);
/// ```
#[derive(Clone, Default)]
pub struct MemoryDiskManager {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDiskManager {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the I/O counters.
    pub fn counts(&self) -> DiskIoCounts {
        self.state.lock().counts
    }

    /// Ordered list of `(page_id, first byte)` for every write so far.
    pub fn write_log(&self) -> Vec<(PageId, u8)> {
        self.state.lock().write_log.clone()
    }

    /// Copy of the durable content of `page_id`, if allocated.
    pub fn page_content(&self, page_id: PageId) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let idx = state.check_allocated(page_id).ok()?;
        Some(state.pages[idx].to_vec())
    }

    /// Number of allocated, not deallocated, pages.
    pub fn live_page_count(&self) -> usize {
        let state = self.state.lock();
        state.pages.len() - state.free_ids.len()
    }

    /// Make every subsequent `read_page` fail with an I/O error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Make every subsequent `write_page` fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_reads {
            return Err(io::Error::other("injected read failure").into());
        }
        let idx = state.check_allocated(page_id)?;
        page.as_mut_slice().copy_from_slice(&state.pages[idx]);
        state.counts.reads += 1;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(io::Error::other("injected write failure").into());
        }
        let idx = state.check_allocated(page_id)?;
        state.pages[idx].copy_from_slice(page.as_slice());
        state.counts.writes += 1;
        state.write_log.push((page_id, page.as_slice()[0]));
        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        let mut state = self.state.lock();
        state.counts.allocations += 1;

        if let Some(id) = state.free_ids.pop_first() {
            state.pages[id as usize].fill(0);
            return Ok(PageId::new(id));
        }

        let page_id = PageId::new(state.pages.len() as u32);
        state.pages.push(vec![0u8; PAGE_SIZE].into_boxed_slice());
        Ok(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        state.check_allocated(page_id)?;
        state.free_ids.insert(page_id.0);
        state.counts.deallocations += 1;
        Ok(())
    }
}
