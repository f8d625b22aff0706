//! Log Manager handle.
//!
//! The buffer pool holds a [`LogManager`] but never calls it. The handle is
//! threaded through so recovery-aware callers that reach the pool can stamp
//! pages with LSNs and check what has been made durable.

use std::sync::atomic::{AtomicU64, Ordering};

/// A log sequence number.
pub type Lsn = u64;

/// LSN meaning "no log record".
pub const INVALID_LSN: Lsn = 0;

/// Hands out log sequence numbers and tracks the durable horizon.
///
/// # Example
/// ```
/// use clockpool::LogManager;
///
/// let log = LogManager::new();
/// let first = log.next_lsn();
/// let second = log.next_lsn();
/// assert!(second > first);
///
/// log.set_persistent_lsn(first);
/// assert!(log.is_persistent(first));
/// assert!(!log.is_persistent(second));
/// ```
#[derive(Debug)]
pub struct LogManager {
    next_lsn: AtomicU64,
    persistent_lsn: AtomicU64,
}

impl LogManager {
    /// Create a log manager whose first LSN is 1.
    pub fn new() -> Self {
        Self {
            next_lsn: AtomicU64::new(INVALID_LSN + 1),
            persistent_lsn: AtomicU64::new(INVALID_LSN),
        }
    }

    /// Reserve the next LSN.
    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.fetch_add(1, Ordering::SeqCst)
    }

    /// Highest LSN known to be on durable storage.
    pub fn persistent_lsn(&self) -> Lsn {
        self.persistent_lsn.load(Ordering::Acquire)
    }

    /// Advance the durable horizon. Never moves it backwards.
    pub fn set_persistent_lsn(&self, lsn: Lsn) {
        self.persistent_lsn.fetch_max(lsn, Ordering::AcqRel);
    }

    /// Whether the record at `lsn` is durable.
    pub fn is_persistent(&self, lsn: Lsn) -> bool {
        lsn <= self.persistent_lsn()
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
