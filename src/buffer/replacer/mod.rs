//! Eviction policy.
//!
//! - [`ClockReplacer`] - Second-chance (CLOCK) over a fixed frame ring

mod clock;

pub use clock::ClockReplacer;
