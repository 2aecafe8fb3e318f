//! Frame identifier type.

use std::fmt;

/// Identifies a frame in the buffer pool.
///
/// Frames live in index-aligned vectors (page store and frame table), so the
/// id is a plain `usize` usable directly as an index: `frames[frame_id.0]`.
///
/// # Example
/// ```
/// use clockpool::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.0, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }

    /// The frame after this one in a circular table of `num_frames`.
    #[inline]
    pub fn wrapping_next(self, num_frames: usize) -> Self {
        FrameId((self.0 + 1) % num_frames)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
