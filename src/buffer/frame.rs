//! Frame descriptor - per-frame bookkeeping in the frame table.
//!
//! A [`FrameDescriptor`] sits at the same index as the page bytes it
//! describes and records:
//! - Which page of which file is loaded (if any)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//! - Reference bit for the clock sweep

use std::fmt;

use crate::common::{FileId, PageId};
use crate::storage::FileRef;

/// Metadata for one buffer frame.
///
/// A frame is *free* when `valid` is false and it has no owner. It becomes
/// *resident* through [`set`](Self::set) and returns to free only through
/// [`clear`](Self::clear).
///
/// Descriptors are plain data: the buffer manager keeps the whole frame
/// table behind one lock, so no field needs its own synchronization.
#[derive(Clone)]
pub struct FrameDescriptor {
    /// File owning the loaded page, or None if the frame is free.
    file: Option<FileRef>,

    /// Loaded page, or `PageId::INVALID`.
    page_id: PageId,

    /// Number of outstanding holders.
    pin_count: u32,

    /// Whether the page has been modified since it was loaded or written.
    dirty: bool,

    /// Whether the residency index maps a page to this frame.
    valid: bool,

    /// Second-chance bit, set on every touch and cleared by the clock.
    ref_bit: bool,
}

impl FrameDescriptor {
    /// Create a free descriptor.
    pub fn new() -> Self {
        Self {
            file: None,
            page_id: PageId::INVALID,
            pin_count: 0,
            dirty: false,
            valid: false,
            ref_bit: false,
        }
    }

    /// Make the frame resident for `page_id` of `file`, pinned once.
    pub fn set(&mut self, file: FileRef, page_id: PageId) {
        self.file = Some(file);
        self.page_id = page_id;
        self.pin_count = 1;
        self.dirty = false;
        self.valid = true;
        self.ref_bit = true;
    }

    /// Return the frame to the free state.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Owning file, if any.
    #[inline]
    pub fn file(&self) -> Option<&FileRef> {
        self.file.as_ref()
    }

    /// Identity of the owning file, if any.
    #[inline]
    pub fn file_id(&self) -> Option<FileId> {
        self.file.as_ref().map(|f| f.file_id())
    }

    /// Whether `file` owns this frame.
    #[inline]
    pub fn is_owned_by(&self, file: FileId) -> bool {
        self.file_id() == Some(file)
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    // ========================================================================
    // Pin count
    // ========================================================================

    /// Increment the pin count and set the reference bit.
    ///
    /// Returns the new pin count.
    #[inline]
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.ref_bit = true;
        self.pin_count
    }

    /// Decrement the pin count. Returns the new pin count, or None if the
    /// frame was not pinned (nothing changes in that case).
    #[inline]
    pub fn unpin(&mut self) -> Option<u32> {
        self.pin_count = self.pin_count.checked_sub(1)?;
        Some(self.pin_count)
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    // ========================================================================
    // Dirty flag
    // ========================================================================

    /// Mark the frame as modified. Only a write-back clears it.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ========================================================================
    // Reference bit
    // ========================================================================

    #[inline]
    pub fn ref_bit(&self) -> bool {
        self.ref_bit
    }

    #[inline]
    pub fn clear_ref_bit(&mut self) {
        self.ref_bit = false;
    }

    /// A frame can be reused without write-back or eviction.
    #[inline]
    pub fn is_free(&self) -> bool {
        !self.valid
    }

    /// Drop the valid flag while keeping the owner, producing the
    /// inconsistent state flush checks for.
    #[cfg(test)]
    pub(crate) fn force_invalid(&mut self) {
        self.valid = false;
    }
}

impl Default for FrameDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameDescriptor")
            .field("file", &self.file_id())
            .field("page_id", &self.page_id)
            .field("pin_count", &self.pin_count)
            .field("dirty", &self.dirty)
            .field("valid", &self.valid)
            .field("ref_bit", &self.ref_bit)
            .finish()
    }
}
