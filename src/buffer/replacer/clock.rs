//! CLOCK (second-chance) replacement policy.
//!
//! Approximates LRU with one reference bit per frame and a hand that sweeps
//! the frame table circularly:
//!
//! ```text
//!            hand
//!             ↓
//!   ┌───┬───┬───┬───┬───┐
//!   │ 1 │ 0 │ 1 │ P │ 0 │   1 = ref bit set, P = pinned
//!   └───┴───┴───┴───┴───┘
//! ```
//!
//! At each step the hand moves one frame forward, then:
//! 1. an invalid frame is taken as is;
//! 2. a set reference bit is cleared and the frame skipped (second chance);
//! 3. a pinned frame is skipped;
//! 4. otherwise the frame is the victim.

use tracing::trace;

use crate::buffer::FrameDescriptor;
use crate::common::{Error, FrameId, Result};

/// Outcome of a clock sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockChoice {
    /// The frame holds no page and can be used directly.
    Free(FrameId),
    /// The frame holds an unpinned, unreferenced page that must be written
    /// back (if dirty) and deregistered before reuse.
    Victim(FrameId),
}

impl ClockChoice {
    /// The chosen frame.
    pub fn frame_id(&self) -> FrameId {
        match *self {
            ClockChoice::Free(fid) | ClockChoice::Victim(fid) => fid,
        }
    }
}

/// Clock hand over a frame table.
///
/// The hand persists across calls. It starts on the last frame so the first
/// sweep begins at frame 0.
#[derive(Debug)]
pub struct ClockReplacer {
    hand: FrameId,
    num_frames: usize,
}

impl ClockReplacer {
    /// Create a replacer for a table of `num_frames` frames.
    ///
    /// # Panics
    /// Panics if `num_frames` is 0.
    pub fn new(num_frames: usize) -> Self {
        assert!(num_frames > 0, "clock needs at least one frame");
        Self {
            hand: FrameId::new(num_frames - 1),
            num_frames,
        }
    }

    /// Frame the hand currently points at.
    #[inline]
    pub fn hand(&self) -> FrameId {
        self.hand
    }

    /// Number of frames swept over.
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Sweep until a frame can be (re)used.
    ///
    /// Clears reference bits along the way. The frames themselves are not
    /// otherwise touched: evicting a [`ClockChoice::Victim`] is the caller's
    /// job, and the hand stays on it.
    ///
    /// Every frame is visited at most twice. The first revolution may do
    /// nothing but clear reference bits; if the second one, ending back on
    /// the starting frame, still finds no candidate then every valid frame
    /// is pinned.
    ///
    /// The return to the start is counted after the frame under the hand is
    /// examined, not before. A buffer manager that checks first gives up on
    /// a start frame it has just cleared; this one takes it.
    ///
    /// # Errors
    /// `Error::NoFreeFrames` after two fruitless revolutions.
    pub fn select(&mut self, frames: &mut [FrameDescriptor]) -> Result<ClockChoice> {
        debug_assert_eq!(frames.len(), self.num_frames);

        let start = self.hand;
        let mut revolutions = 0;

        loop {
            self.hand = self.hand.wrapping_next(self.num_frames);

            let frame = &mut frames[self.hand.0];
            if frame.is_free() {
                trace!(frame = %self.hand, "clock found free frame");
                return Ok(ClockChoice::Free(self.hand));
            }

            if frame.ref_bit() {
                frame.clear_ref_bit();
            } else if !frame.is_pinned() {
                trace!(frame = %self.hand, "clock chose victim");
                return Ok(ClockChoice::Victim(self.hand));
            }

            if self.hand == start {
                revolutions += 1;
                if revolutions == 2 {
                    return Err(Error::NoFreeFrames);
                }
            }
        }
    }
}
