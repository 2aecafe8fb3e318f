//! Residency index - which frame holds which page.

use std::collections::HashMap;

use crate::common::config::index_capacity;
use crate::common::{FileId, FrameId, IndexError, PageId};

/// Maps `(file, page)` to the frame caching it.
///
/// The buffer manager keeps exactly one entry per valid frame. A missed
/// lookup is a normal outcome, not an error.
pub trait ResidencyIndex {
    /// Frame holding `page` of `file`, if cached.
    fn lookup(&self, file: FileId, page: PageId) -> Option<FrameId>;

    /// Record that `frame` now holds `page` of `file`.
    ///
    /// # Errors
    /// `IndexError::Duplicate` if the key is already mapped.
    fn insert(&mut self, file: FileId, page: PageId, frame: FrameId) -> Result<(), IndexError>;

    /// Forget the mapping for `page` of `file`, returning the frame it named.
    ///
    /// # Errors
    /// `IndexError::NotFound` if the key is not mapped.
    fn remove(&mut self, file: FileId, page: PageId) -> Result<FrameId, IndexError>;

    /// Number of mapped pages.
    fn len(&self) -> usize;

    /// Whether no page is mapped.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default [`ResidencyIndex`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct HashResidencyIndex {
    map: HashMap<(FileId, PageId), FrameId>,
}

impl HashResidencyIndex {
    /// Create an index sized for a pool of `pool_size` frames.
    pub fn for_pool(pool_size: usize) -> Self {
        Self {
            map: HashMap::with_capacity(index_capacity(pool_size)),
        }
    }
}

impl ResidencyIndex for HashResidencyIndex {
    fn lookup(&self, file: FileId, page: PageId) -> Option<FrameId> {
        self.map.get(&(file, page)).copied()
    }

    fn insert(&mut self, file: FileId, page: PageId, frame: FrameId) -> Result<(), IndexError> {
        match self.map.entry((file, page)) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(IndexError::Duplicate { file, page })
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(frame);
                Ok(())
            }
        }
    }

    fn remove(&mut self, file: FileId, page: PageId) -> Result<FrameId, IndexError> {
        self.map
            .remove(&(file, page))
            .ok_or(IndexError::NotFound { file, page })
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
