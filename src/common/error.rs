//! Error types for the buffer manager.

use thiserror::Error;

use super::{FileId, FrameId, PageId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`
/// (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the buffer manager and its collaborators.
///
/// Every variant is returned to the immediate caller. Nothing is retried
/// internally.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a page file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page file has no such page (never allocated, or disposed).
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Every frame is pinned; the clock made two full sweeps without
    /// finding a victim.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The residency index rejected an insert or remove.
    #[error("residency index failure: {0}")]
    Index(#[from] IndexError),

    /// Unpin of a page that is not cached.
    #[error("{page} of {file} is not resident in the buffer pool")]
    NotResident { file: FileId, page: PageId },

    /// Unpin of a page whose pin count is already zero.
    ///
    /// This indicates a bug in the caller: unpins must match pins.
    #[error("{page} of {file} is not pinned")]
    PageNotPinned { file: FileId, page: PageId },

    /// Flush of a file while one of its pages is still pinned.
    #[error("{page} of {file} is pinned")]
    PagePinned { file: FileId, page: PageId },

    /// A frame names an owning file but is not valid.
    ///
    /// Frame table corruption; never part of normal operation.
    #[error("{frame} is owned by {file} but marked invalid")]
    InconsistentFrame { frame: FrameId, file: FileId },
}

/// Failures reported by a [`ResidencyIndex`](crate::buffer::ResidencyIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndexError {
    /// An entry for the key already exists.
    #[error("{page} of {file} is already mapped")]
    Duplicate { file: FileId, page: PageId },

    /// No entry exists for the key.
    #[error("{page} of {file} is not mapped")]
    NotFound { file: FileId, page: PageId },
}
