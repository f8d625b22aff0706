//! Storage layer - the durable page store the buffer pool sits on.
//!
//! - [`DiskManager`] - The page store contract
//! - [`FileDiskManager`] - Single-file implementation
//! - [`MemoryDiskManager`] - In-memory implementation with I/O accounting
//! - [`Page`] - The raw 4KB data container

mod disk_manager;
mod memory_disk_manager;
mod page;

pub use disk_manager::{DiskManager, FileDiskManager};
pub use memory_disk_manager::{DiskIoCounts, MemoryDiskManager};
pub use page::Page;
