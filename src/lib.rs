//! clockpool - the page cache layer of a disk-backed storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        Callers: indexes, heap files (not part of this crate)    │
//! │        fetch / unpin / new / delete / flush                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │   BufferPoolManager: page table, free list, pins, dirty  │   │
//! │  │   ClockReplacer: second-chance victim selection          │   │
//! │  │   Frame store: Vec<Frame>, checked PageHandles           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Storage Layer (storage/)                 │   │
//! │  │   DiskManager trait: FileDiskManager, MemoryDiskManager  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │  LogManager handle (recovery/) is carried, never called.       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, config)
//! - [`error`] - Error type and `Result` alias
//! - [`buffer`] - Buffer pool manager and CLOCK replacer
//! - [`storage`] - Disk managers and the page type
//! - [`recovery`] - Log manager handle
//!
//! # Quick Start
//! ```no_run
//! use clockpool::{BufferPoolManager, FileDiskManager};
//!
//! let disk = FileDiskManager::open_or_create("my_database.db")?;
//! let bpm = BufferPoolManager::new(64, disk, None);
//!
//! let handle = bpm.new_page()?.expect("empty pool has free frames");
//! handle.write()?.as_mut_slice()[..5].copy_from_slice(b"hello");
//! bpm.unpin_page(handle.page_id(), true)?;
//! bpm.flush_all_pages()?;
//! # Ok::<(), clockpool::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod error;
pub mod recovery;
pub mod storage;

pub use common::config::PAGE_SIZE;
pub use common::{BufferPoolConfig, Error, FrameId, PageId, Result};

pub use buffer::{
    BufferPoolManager, BufferPoolStats, ClockReplacer, Frame, PageHandle, PageReadGuard,
    PageWriteGuard, PinnedPage, StatsSnapshot,
};
pub use recovery::{LogManager, Lsn};
pub use storage::{DiskIoCounts, DiskManager, FileDiskManager, MemoryDiskManager, Page};
