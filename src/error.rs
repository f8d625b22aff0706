//! Error types for clockpool.
//!
//! Only disk failures and caller-contract violations are errors. The routine
//! buffer pool outcomes (page not resident, pool exhausted, page in use) are
//! reported as `false` / `None` by the operations themselves.

use thiserror::Error;

use crate::common::{FrameId, PageId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in clockpool.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("{0} not found on disk")]
    PageNotFound(PageId),

    /// The `INVALID` sentinel was passed where a real page is required.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    /// Attempted to unpin a page whose pin count is already zero.
    ///
    /// This indicates a bug in the caller: every unpin must match a fetch
    /// or a new page.
    #[error("{0} is not pinned")]
    PageNotPinned(PageId),

    /// A page handle was used after its frame was given to another page.
    #[error("Stale handle for {page_id} in {frame_id}")]
    StaleHandle { page_id: PageId, frame_id: FrameId },

    /// Database file length is not a whole, addressable number of pages.
    #[error("Database file of {0} bytes is not a valid page file")]
    InvalidFileSize(u64),

    /// Buffer pool configuration was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
