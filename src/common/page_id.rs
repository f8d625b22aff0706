//! Page identifier type.

use std::fmt;

/// Identifies a logical page, whether or not it is resident in the pool.
///
/// Ids are handed out by the disk manager's `allocate_page`. A `u32` gives
/// 2^32 pages, or 16TB at 4KB per page.
///
/// # Example
/// ```
/// use clockpool::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Sentinel for "no page assigned".
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is a real page (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Byte offset of this page in a single-file store.
    #[inline]
    pub(crate) fn file_offset(&self, page_size: usize) -> u64 {
        self.0 as u64 * page_size as u64
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
