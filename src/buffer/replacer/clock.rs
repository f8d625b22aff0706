//! CLOCK (second-chance) replacement policy.

use crate::common::FrameId;

/// Per-slot state on the clock ring.
#[derive(Debug, Clone, Copy, Default)]
struct ClockSlot {
    /// Frame is in the candidate set.
    evictable: bool,
    /// Laps the frame survives before it can be chosen.
    chances: u8,
}

/// Second-chance eviction over a fixed ring of frame ids `[0, num_frames)`.
///
/// A frame enters the candidate set through [`unpin`](Self::unpin) with one
/// reprieve. The hand sweeps forward: an evictable frame with a reprieve
/// loses it and is skipped, an evictable frame without one is the victim,
/// and non-evictable frames are passed over untouched.
///
/// The replacer knows nothing about pages or disk. The buffer pool calls it
/// under its own latch, so it takes `&mut self` and holds no lock.
///
/// # Example
/// ```
/// use clockpool::{ClockReplacer, FrameId};
///
/// let mut replacer = ClockReplacer::new(2);
/// replacer.unpin(FrameId::new(0));
/// replacer.unpin(FrameId::new(1));
///
/// // Both frames burn their reprieve on the first lap.
/// assert_eq!(replacer.victim(), Some(FrameId::new(0)));
/// assert_eq!(replacer.size(), 1);
/// ```
#[derive(Debug)]
pub struct ClockReplacer {
    slots: Vec<ClockSlot>,
    clock_hand: usize,
    evictable_count: usize,
}

impl ClockReplacer {
    /// Reprieve granted to a frame when it becomes evictable.
    pub const INITIAL_CHANCES: u8 = 1;

    /// Create a replacer for `num_frames` frames, none of them evictable.
    ///
    /// # Panics
    /// Panics if `num_frames` is 0.
    pub fn new(num_frames: usize) -> Self {
        assert!(num_frames > 0, "num_frames must be > 0");
        Self {
            slots: vec![ClockSlot::default(); num_frames],
            clock_hand: 0,
            evictable_count: 0,
        }
    }

    /// Choose and remove a victim, or `None` if nothing is evictable.
    pub fn victim(&mut self) -> Option<FrameId> {
        if self.evictable_count == 0 {
            return None;
        }

        // Terminates: some evictable slot reaches zero chances within
        // INITIAL_CHANCES + 1 laps.
        loop {
            let hand = self.clock_hand;
            self.clock_hand = (hand + 1) % self.slots.len();

            let slot = &mut self.slots[hand];
            if !slot.evictable {
                continue;
            }
            if slot.chances > 0 {
                slot.chances -= 1;
                continue;
            }

            slot.evictable = false;
            self.evictable_count -= 1;
            return Some(FrameId::new(hand));
        }
    }

    /// Remove `frame_id` from the candidate set. No-op if not evictable.
    pub fn pin(&mut self, frame_id: FrameId) {
        let slot = &mut self.slots[frame_id.index()];
        if slot.evictable {
            slot.evictable = false;
            self.evictable_count -= 1;
        }
    }

    /// Add `frame_id` to the candidate set with a fresh reprieve.
    ///
    /// No-op if already evictable: repeated unpins do not renew the reprieve.
    pub fn unpin(&mut self, frame_id: FrameId) {
        let slot = &mut self.slots[frame_id.index()];
        if !slot.evictable {
            slot.evictable = true;
            slot.chances = Self::INITIAL_CHANCES;
            self.evictable_count += 1;
        }
    }

    /// Number of evictable frames.
    #[inline]
    pub fn size(&self) -> usize {
        self.evictable_count
    }

    /// Number of frames on the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `frame_id` is currently in the candidate set.
    #[inline]
    pub fn is_evictable(&self, frame_id: FrameId) -> bool {
        self.slots[frame_id.index()].evictable
    }

    /// Current position of the clock hand.
    #[inline]
    pub fn clock_hand(&self) -> FrameId {
        FrameId::new(self.clock_hand)
    }
}
