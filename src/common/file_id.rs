//! File identifier type.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_FILE_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of an open page file.
///
/// Together with a [`PageId`](super::PageId) it forms the residency key of a
/// cached page. Ids are handed out by [`FileId::next`] and are unique for the
/// lifetime of the process; they are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a FileId from a raw value.
    #[inline]
    pub fn new(id: u32) -> Self {
        FileId(id)
    }

    /// Allocate a fresh, process-unique FileId.
    pub fn next() -> Self {
        FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}
