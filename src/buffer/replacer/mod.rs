//! Replacement policy.
//!
//! - [`ClockReplacer`] - CLOCK / second chance, an approximation of LRU
//!   needing one bit per frame

mod clock;

pub use clock::{ClockChoice, ClockReplacer};
