//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between the storage layers above
//! (indexes, heap files) and the disk manager. It manages a fixed pool of
//! frames, each holding at most one page.
//!
//! # Components
//! - [`BufferPoolManager`] - Page table, free list, pins and write-back
//! - [`ClockReplacer`] - Second-chance choice of which unpinned frame to reuse
//! - [`Frame`] - A slot of the frame store
//! - [`PageHandle`] - Checked handle to a pinned page's content
//! - [`PinnedPage`] - RAII pin that unpins on drop
//! - [`BufferPoolStats`] - Performance statistics

mod buffer_pool_manager;
mod frame;
mod page_guard;
mod page_handle;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::Frame;
pub use page_guard::PinnedPage;
pub use page_handle::{PageHandle, PageReadGuard, PageWriteGuard};
pub use replacer::ClockReplacer;
pub use stats::{BufferPoolStats, StatsSnapshot};
