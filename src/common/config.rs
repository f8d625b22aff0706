//! Configuration for clockpool.

use super::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// Pool-wide constant: every frame and every disk page has this size, and
/// there is no per-page negotiation.
pub const PAGE_SIZE: usize = 4096;

/// Pool size used by [`BufferPoolConfig::default`].
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Construction parameters for a [`BufferPoolManager`].
///
/// [`BufferPoolManager`]: crate::buffer::BufferPoolManager
///
/// # Example
/// ```
/// use clockpool::BufferPoolConfig;
///
/// let config = BufferPoolConfig { pool_size: 128 };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.memory_bytes(), 128 * 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool. Fixed for the lifetime of the pool.
    pub pool_size: usize,
}

impl BufferPoolConfig {
    /// Check that the configuration describes a usable pool.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be > 0".into()));
        }
        Ok(())
    }

    /// Memory held by the frame store, in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.pool_size * PAGE_SIZE
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}
