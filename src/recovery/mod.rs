//! Write-ahead log plumbing visible to the buffer pool.

mod log_manager;

pub use log_manager::{LogManager, Lsn, INVALID_LSN};
