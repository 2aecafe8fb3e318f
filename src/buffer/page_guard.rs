//! Handles to pinned pages.
//!
//! - [`PinnedPage`] - A pinned frame; the caller releases it with
//!   [`BufferManager::unpin_page`]
//! - [`PageReadGuard`] - Shared access, unpins clean on drop
//! - [`PageWriteGuard`] - Exclusive access, unpins dirty on drop

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::buffer::{BufferManager, HashResidencyIndex, ResidencyIndex};
use crate::common::{FileId, FrameId, PageId};
use crate::storage::page::Page;

/// A page pinned in the buffer pool.
///
/// Returned by [`BufferManager::fetch_page`] and [`BufferManager::new_page`].
/// The frame cannot be evicted until every pin on it has been released with
/// [`BufferManager::unpin_page`]. After its matching unpin this handle must
/// not be used again: the frame may already hold a different page.
///
/// # Example
/// ```ignore
/// let pinned = bpm.fetch_page(&file, page_id)?;
/// pinned.write().as_mut_slice()[0] = 0xAB;
/// bpm.unpin_page(&file, page_id, true)?;
/// ```
pub struct PinnedPage<'a> {
    page: &'a RwLock<Page>,
    frame_id: FrameId,
    file_id: FileId,
    page_id: PageId,
}

impl<'a> PinnedPage<'a> {
    pub(crate) fn new(
        page: &'a RwLock<Page>,
        frame_id: FrameId,
        file_id: FileId,
        page_id: PageId,
    ) -> Self {
        Self {
            page,
            frame_id,
            file_id,
            page_id,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Lock the frame's bytes for reading.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'a, Page> {
        self.page.read()
    }

    /// Lock the frame's bytes for writing.
    ///
    /// Writing does not mark the page dirty; pass `dirty = true` to the
    /// matching unpin.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'a, Page> {
        self.page.write()
    }
}

/// Releases one pin when dropped.
///
/// Guards hold this after their page lock, so the lock is gone by the time
/// the pool lock is taken for the unpin.
struct PinRelease<'a, I: ResidencyIndex> {
    bpm: &'a BufferManager<I>,
    frame_id: FrameId,
    file_id: FileId,
    page_id: PageId,
    dirty: bool,
}

impl<'a, I: ResidencyIndex> PinRelease<'a, I> {
    fn new(bpm: &'a BufferManager<I>, pinned: &PinnedPage<'a>, dirty: bool) -> Self {
        Self {
            bpm,
            frame_id: pinned.frame_id,
            file_id: pinned.file_id,
            page_id: pinned.page_id,
            dirty,
        }
    }
}

impl<I: ResidencyIndex> Drop for PinRelease<'_, I> {
    fn drop(&mut self) {
        if let Err(err) = self.bpm.unpin_by_id(self.file_id, self.page_id, self.dirty) {
            debug!(page = %self.page_id, dirty = self.dirty, %err, "guard unpin failed");
        }
    }
}

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is unpinned (clean) when the guard is dropped.
pub struct PageReadGuard<'a, I: ResidencyIndex = HashResidencyIndex> {
    // Field order matters: the lock is dropped before the pin.
    lock: RwLockReadGuard<'a, Page>,
    pin: PinRelease<'a, I>,
}

impl<'a, I: ResidencyIndex> PageReadGuard<'a, I> {
    pub(crate) fn new(bpm: &'a BufferManager<I>, pinned: PinnedPage<'a>) -> Self {
        Self {
            pin: PinRelease::new(bpm, &pinned, false),
            lock: pinned.read(),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.pin.frame_id
    }
}

impl<I: ResidencyIndex> Deref for PageReadGuard<'_, I> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time. The page is
/// marked dirty and unpinned when the guard is dropped.
pub struct PageWriteGuard<'a, I: ResidencyIndex = HashResidencyIndex> {
    // Field order matters: the lock is dropped before the pin.
    lock: RwLockWriteGuard<'a, Page>,
    pin: PinRelease<'a, I>,
}

impl<'a, I: ResidencyIndex> PageWriteGuard<'a, I> {
    pub(crate) fn new(bpm: &'a BufferManager<I>, pinned: PinnedPage<'a>) -> Self {
        Self {
            pin: PinRelease::new(bpm, &pinned, true),
            lock: pinned.write(),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.pin.frame_id
    }
}

impl<I: ResidencyIndex> Deref for PageWriteGuard<'_, I> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl<I: ResidencyIndex> DerefMut for PageWriteGuard<'_, I> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}
