use std::fmt;

/// Slot in the frame store, in `[0, pool_size)`.
///
/// Frames are never allocated or freed on their own; the id is the index
/// into the store and into the clock ring, nothing more. Which page a frame
/// holds is tracked by the pool, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(index: usize) -> Self {
        FrameId(index)
    }

    /// Position in the frame store.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    /// Every frame of a pool with `pool_size` slots, lowest first.
    pub fn all(pool_size: usize) -> impl DoubleEndedIterator<Item = FrameId> {
        (0..pool_size).map(FrameId)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
