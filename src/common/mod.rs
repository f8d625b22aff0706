//! Common types shared across clockpool.
//!
//! - Configuration (page size, pool config)
//! - Error types (re-exported from `crate::error`)
//! - Identifiers (PageId, FrameId)

pub mod config;
mod frame_id;
mod page_id;

pub use config::BufferPoolConfig;
pub use crate::error::{Error, Result};
pub use frame_id::FrameId;
pub use page_id::PageId;
