//! Buffer pool statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by the buffer pool.
///
/// All fields are atomic and updated with `Ordering::Relaxed`: counters are
/// independent and only need to be individually exact.
///
/// # Example
/// ```
/// use clockpool::BufferPoolStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BufferPoolStats::new();
/// stats.cache_hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().cache_hits, 1);
/// ```
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    /// Fetches served from a resident frame.
    pub cache_hits: AtomicU64,

    /// Fetches that needed a frame and a disk read.
    pub cache_misses: AtomicU64,

    /// Resident pages pushed out by the replacer.
    pub evictions: AtomicU64,

    /// Evictions that had to write a dirty victim first.
    pub dirty_writebacks: AtomicU64,

    /// Pages read from disk.
    pub pages_read: AtomicU64,

    /// Pages written to disk (write-backs and explicit flushes).
    pub pages_written: AtomicU64,

    /// Page ids obtained from the disk manager.
    pub pages_allocated: AtomicU64,

    /// Page ids returned to the disk manager.
    pub pages_deallocated: AtomicU64,
}

impl BufferPoolStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Get a non-atomic copy for display/logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            dirty_writebacks: self.dirty_writebacks.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            pages_deallocated: self.pages_deallocated.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.cache_hits,
            &self.cache_misses,
            &self.evictions,
            &self.dirty_writebacks,
            &self.pages_read,
            &self.pages_written,
            &self.pages_allocated,
            &self.pages_deallocated,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A point-in-time snapshot of buffer pool statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub dirty_writebacks: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_allocated: u64,
    pub pages_deallocated: u64,
}

impl StatsSnapshot {
    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {} ({} dirty), reads: {}, writes: {}, hit_rate: {:.2}% }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.dirty_writebacks,
            self.pages_read,
            self.pages_written,
            self.hit_rate() * 100.0
        )
    }
}
