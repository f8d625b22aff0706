//! Disk managers - durable page stores behind the buffer pool.
//!
//! The [`DiskManager`] trait is the only contract the buffer pool has with
//! disk. [`FileDiskManager`] is the single-file implementation.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// A durable store of fixed-size pages addressed by [`PageId`].
///
/// The buffer pool calls every method while holding its latch, so
/// implementations need no internal synchronization. They only need to be
/// `Send` so the pool can be shared across threads.
pub trait DiskManager: Send {
    /// Fill `page` with the durable content of `page_id`.
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Persist `page` as the content of `page_id`.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// Return a fresh page id whose content reads as zeros.
    fn allocate_page(&mut self) -> Result<PageId>;

    /// Mark `page_id` as reclaimable. A later `allocate_page` may return it.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;
}

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// # Deallocation
/// Deallocated ids are kept in memory and reused lowest-first. The set is
/// not persisted: after `open`, every page in the file counts as allocated.
///
/// # Durability
/// Every write and allocation is followed by `fsync()`.
pub struct FileDiskManager {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
    /// Ids returned by `deallocate_page` and not yet reused.
    free_ids: BTreeSet<u32>,
}

impl FileDiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
            free_ids: BTreeSet::new(),
        })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened, and
    /// `Error::InvalidFileSize` if its length is not a whole page count.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let page_count = page_count_for_len(file.metadata()?.len())?;

        Ok(Self {
            file,
            page_count,
            free_ids: BTreeSet::new(),
        })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Number of pages in the file, including deallocated ones.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of deallocated ids waiting for reuse.
    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.free_ids.len()
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        PageId::new(self.page_count).file_offset(PAGE_SIZE)
    }

    fn check_allocated(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count || self.free_ids.contains(&page_id.0)
        {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    fn write_at(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.write_all(data)?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Number of pages in a file of `len` bytes.
///
/// # Errors
/// `Error::InvalidFileSize` for a trailing partial page, or for more pages
/// than a `PageId` can address.
fn page_count_for_len(len: u64) -> Result<u32> {
    let page_size = PAGE_SIZE as u64;
    if len % page_size != 0 {
        return Err(Error::InvalidFileSize(len));
    }
    u32::try_from(len / page_size).map_err(|_| Error::InvalidFileSize(len))
}

impl DiskManager for FileDiskManager {
    /// # Errors
    /// Returns `Error::PageNotFound` if the page is not allocated.
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.check_allocated(page_id)?;

        self.file
            .seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.read_exact(page.as_mut_slice())?;

        Ok(())
    }

    /// # Errors
    /// Returns `Error::PageNotFound` if the page is not allocated.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_allocated(page_id)?;
        self.write_at(page_id, page.as_slice())
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        let zeros = [0u8; PAGE_SIZE];

        if let Some(id) = self.free_ids.first().copied() {
            let page_id = PageId::new(id);
            self.write_at(page_id, &zeros)?;
            self.free_ids.remove(&id);
            debug!(%page_id, "reused deallocated page");
            return Ok(page_id);
        }

        let page_id = PageId::new(self.page_count);
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }

        // Extend file with a zeroed page
        self.write_at(page_id, &zeros)?;
        self.page_count += 1;

        Ok(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_allocated(page_id)?;
        self.free_ids.insert(page_id.0);
        Ok(())
    }
}
