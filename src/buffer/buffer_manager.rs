//! Buffer Manager - the page caching layer.
//!
//! The [`BufferManager`] provides:
//! - Page caching between page files and memory
//! - Pin-based reference counting
//! - CLOCK replacement with write-back of dirty victims
//! - Per-file flush and best-effort drain on teardown

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::buffer::replacer::{ClockChoice, ClockReplacer};
use crate::buffer::{
    BufferPoolStats, FrameDescriptor, HashResidencyIndex, PageReadGuard, PageWriteGuard,
    PinnedPage, ResidencyIndex,
};
use crate::common::config::DEFAULT_POOL_SIZE;
use crate::common::{Error, FileId, FrameId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::FileRef;

/// Manages a fixed pool of frames caching pages of any number of files.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                       BufferManager                         │
/// │  ┌───────────────── state: Mutex ────────────────────────┐  │
/// │  │ ┌──────────────┐  ┌──────────────────────────────────┐│  │
/// │  │ │   index      │  │   frames: Vec<FrameDescriptor>   ││  │
/// │  │ │(file,page)→F │─▶│  [Desc0] [Desc1] [Desc2] ...     ││  │
/// │  │ └──────────────┘  └──────────────────────────────────┘│  │
/// │  │ ┌──────────────┐                                      │  │
/// │  │ │ClockReplacer │                                      │  │
/// │  │ └──────────────┘                                      │  │
/// │  └───────────────────────────────────────────────────────┘  │
/// │   pages: Vec<RwLock<Page>>  [Page0] [Page1] [Page2] ...     │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Serialization
/// The frame table, residency index and clock hand change together, so they
/// share one `Mutex` and every public call runs to completion under it.
/// Page bytes sit outside that lock, index-aligned with the frame table, so
/// pinned pages can be read and written without holding up the pool.
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use clockpool::{BufferManager, FileRef, MemFile};
///
/// let file: FileRef = Arc::new(MemFile::new());
/// let bpm = BufferManager::new(8);
///
/// let pinned = bpm.new_page(&file).unwrap();
/// let page_id = pinned.page_id();
/// pinned.write().as_mut_slice()[0] = 0xAB;
/// bpm.unpin_page(&file, page_id, true).unwrap();
///
/// let guard = bpm.fetch_page_read(&file, page_id).unwrap();
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// ```
pub struct BufferManager<I: ResidencyIndex = HashResidencyIndex> {
    /// Page store, one slot per frame.
    pages: Vec<RwLock<Page>>,

    /// Frame table, residency index and clock hand.
    state: Mutex<PoolState<I>>,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

struct PoolState<I> {
    frames: Vec<FrameDescriptor>,
    index: I,
    replacer: ClockReplacer,
}

/// Read-only view of one frame, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_id: FrameId,
    pub file_id: Option<FileId>,
    pub page_id: PageId,
    pub pin_count: u32,
    pub valid: bool,
    pub dirty: bool,
    pub ref_bit: bool,
}

impl BufferManager<HashResidencyIndex> {
    /// Create a buffer manager with `pool_size` frames and the default
    /// residency index.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize) -> Self {
        Self::with_index(pool_size, HashResidencyIndex::for_pool(pool_size))
    }
}

impl Default for BufferManager<HashResidencyIndex> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl<I: ResidencyIndex> BufferManager<I> {
    /// Create a buffer manager over a caller-supplied residency index.
    ///
    /// The index must start empty.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn with_index(pool_size: usize, index: I) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");
        debug_assert!(index.is_empty(), "residency index must start empty");

        Self {
            pages: (0..pool_size).map(|_| RwLock::new(Page::new())).collect(),
            state: Mutex::new(PoolState {
                frames: vec![FrameDescriptor::new(); pool_size],
                index,
                replacer: ClockReplacer::new(pool_size),
            }),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: Fetch and release
    // ========================================================================

    /// Pin `page_id` of `file`, reading it from the file on a miss.
    ///
    /// The page stays resident until released with [`unpin_page`](Self::unpin_page).
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - any error from writing back a dirty victim or reading the page
    /// - `Error::Index` if the residency index rejects the change
    pub fn fetch_page(&self, file: &FileRef, page_id: PageId) -> Result<PinnedPage<'_>> {
        let file_id = file.file_id();
        let mut state = self.state.lock();

        if let Some(frame_id) = state.index.lookup(file_id, page_id) {
            state.frames[frame_id.0].pin();
            self.stats.record_hit();
            trace!(file = %file_id, page = %page_id, frame = %frame_id, "cache hit");
            return Ok(self.pinned(frame_id, file_id, page_id));
        }

        self.stats.record_miss();
        let frame_id = self.allocate_frame(&mut state)?;

        file.read_page(page_id, &mut self.pages[frame_id.0].write())?;
        self.stats.record_read();

        state.index.insert(file_id, page_id, frame_id)?;
        state.frames[frame_id.0].set(Arc::clone(file), page_id);

        debug!(file = %file_id, page = %page_id, frame = %frame_id, "cache miss, page loaded");
        Ok(self.pinned(frame_id, file_id, page_id))
    }

    /// Release one pin on `page_id` of `file`, marking it dirty if asked.
    ///
    /// The dirty flag is sticky: a clean unpin never clears it.
    ///
    /// # Errors
    /// - `Error::NotResident` if the page is not cached
    /// - `Error::PageNotPinned` if its pin count is already zero
    pub fn unpin_page(&self, file: &FileRef, page_id: PageId, dirty: bool) -> Result<()> {
        self.unpin_by_id(file.file_id(), page_id, dirty)
    }

    /// Unpin keyed by file identity. Also called by page guards on drop.
    pub(crate) fn unpin_by_id(&self, file: FileId, page: PageId, dirty: bool) -> Result<()> {
        let mut state = self.state.lock();

        let frame_id = state
            .index
            .lookup(file, page)
            .ok_or(Error::NotResident { file, page })?;

        let frame = &mut state.frames[frame_id.0];
        frame.unpin().ok_or(Error::PageNotPinned { file, page })?;
        if dirty {
            frame.mark_dirty();
        }
        Ok(())
    }

    /// Fetch a page for reading, unpinned (clean) when the guard drops.
    pub fn fetch_page_read(&self, file: &FileRef, page_id: PageId) -> Result<PageReadGuard<'_, I>> {
        let pinned = self.fetch_page(file, page_id)?;
        Ok(PageReadGuard::new(self, pinned))
    }

    /// Fetch a page for writing, unpinned dirty when the guard drops.
    pub fn fetch_page_write(
        &self,
        file: &FileRef,
        page_id: PageId,
    ) -> Result<PageWriteGuard<'_, I>> {
        let pinned = self.fetch_page(file, page_id)?;
        Ok(PageWriteGuard::new(self, pinned))
    }

    // ========================================================================
    // Public API: Create and dispose pages
    // ========================================================================

    /// Allocate a new page in `file` and pin it in a frame.
    ///
    /// The new page number is available from [`PinnedPage::page_id`].
    ///
    /// The frame is NOT zeroed: it still holds whatever bytes its previous
    /// occupant left there. Callers must initialize the whole page before
    /// relying on its contents.
    ///
    /// # Errors
    /// - errors from the file's page allocation (nothing else happens then)
    /// - `Error::NoFreeFrames` if every frame is pinned; the page number
    ///   stays allocated in the file
    /// - `Error::Index` if the residency index rejects the new entry
    pub fn new_page(&self, file: &FileRef) -> Result<PinnedPage<'_>> {
        let file_id = file.file_id();
        let mut state = self.state.lock();

        let page_id = file.allocate_page()?;
        let frame_id = self.allocate_frame(&mut state)?;

        state.index.insert(file_id, page_id, frame_id)?;
        state.frames[frame_id.0].set(Arc::clone(file), page_id);

        debug!(file = %file_id, page = %page_id, frame = %frame_id, "allocated new page");
        Ok(self.pinned(frame_id, file_id, page_id))
    }

    /// [`new_page`](Self::new_page) returning a write guard.
    pub fn new_page_write(&self, file: &FileRef) -> Result<PageWriteGuard<'_, I>> {
        let pinned = self.new_page(file)?;
        Ok(PageWriteGuard::new(self, pinned))
    }

    /// Drop `page_id` from the pool and hand it back to `file`.
    ///
    /// A cached copy is discarded without write-back, dirty or not. The
    /// page not being cached is fine. The result is the file's answer.
    pub fn dispose_page(&self, file: &FileRef, page_id: PageId) -> Result<()> {
        let file_id = file.file_id();
        let mut state = self.state.lock();

        if let Some(frame_id) = state.index.lookup(file_id, page_id) {
            state.frames[frame_id.0].clear();
            if let Err(err) = state.index.remove(file_id, page_id) {
                debug!(file = %file_id, page = %page_id, %err, "dispose left index untouched");
            }
            debug!(file = %file_id, page = %page_id, frame = %frame_id, "discarded cached page");
        }

        file.dispose_page(page_id)?;
        self.stats.record_dispose();
        Ok(())
    }

    // ========================================================================
    // Public API: Flush
    // ========================================================================

    /// Write back every page of `file` and drop them all from the pool.
    ///
    /// Nothing is written if any page of the file is pinned. A write
    /// failure part-way leaves the pages handled before it flushed and
    /// evicted.
    ///
    /// # Errors
    /// - `Error::PagePinned` if a page of `file` is pinned
    /// - `Error::InconsistentFrame` if a frame owned by `file` is not valid
    /// - any error from the file's writes
    pub fn flush_file(&self, file: &FileRef) -> Result<()> {
        let file_id = file.file_id();
        let mut state = self.state.lock();
        let PoolState { frames, index, .. } = &mut *state;

        for (i, frame) in frames.iter().enumerate() {
            if !frame.is_owned_by(file_id) {
                continue;
            }
            if !frame.is_valid() {
                return Err(Error::InconsistentFrame {
                    frame: FrameId::new(i),
                    file: file_id,
                });
            }
            if frame.is_pinned() {
                return Err(Error::PagePinned {
                    file: file_id,
                    page: frame.page_id(),
                });
            }
        }

        let mut flushed = 0usize;
        for (i, frame) in frames.iter_mut().enumerate() {
            if !frame.is_owned_by(file_id) {
                continue;
            }
            let page_id = frame.page_id();

            if frame.is_dirty() {
                file.write_page(page_id, &self.pages[i].read())?;
                frame.clear_dirty();
                self.stats.record_write();
            }

            if let Err(err) = index.remove(file_id, page_id) {
                debug!(file = %file_id, page = %page_id, %err, "flush found no index entry");
            }
            frame.clear();
            flushed += 1;
        }

        debug!(file = %file_id, pages = flushed, "flushed file");
        Ok(())
    }

    /// Write back one cached page if it is dirty. It stays resident.
    ///
    /// A page that is not cached is ignored. The page lock is only tried,
    /// never waited on, while the pool is locked.
    ///
    /// # Errors
    /// - `Error::PagePinned` if a writer holds the page right now
    /// - any error from the file's write
    pub fn flush_page(&self, file: &FileRef, page_id: PageId) -> Result<()> {
        let file_id = file.file_id();
        let mut state = self.state.lock();

        let Some(frame_id) = state.index.lookup(file_id, page_id) else {
            return Ok(());
        };

        let frame = &mut state.frames[frame_id.0];
        if !frame.is_dirty() {
            return Ok(());
        }

        let page = self.pages[frame_id.0].try_read().ok_or(Error::PagePinned {
            file: file_id,
            page: page_id,
        })?;
        file.write_page(page_id, &page)?;
        frame.clear_dirty();
        self.stats.record_write();
        Ok(())
    }

    /// Write back every dirty page in the pool. Residency is unchanged.
    ///
    /// Pages a writer holds right now are skipped and stay dirty; the rest
    /// are still written. Stops at the first failing write.
    ///
    /// # Errors
    /// - any error from a file's write
    /// - `Error::PagePinned` for the first skipped page, once every other
    ///   dirty page has been written
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut state = self.state.lock();
        let mut skipped = None;

        for (i, frame) in state.frames.iter_mut().enumerate() {
            if !(frame.is_valid() && frame.is_dirty()) {
                continue;
            }
            let Some(file) = frame.file() else {
                continue;
            };
            let Some(page) = self.pages[i].try_read() else {
                debug!(file = %file.file_id(), page = %frame.page_id(), "flush skipped locked page");
                if skipped.is_none() {
                    skipped = Some(Error::PagePinned {
                        file: file.file_id(),
                        page: frame.page_id(),
                    });
                }
                continue;
            };

            file.write_page(frame.page_id(), &page)?;
            drop(page);
            frame.clear_dirty();
            self.stats.record_write();
        }

        skipped.map_or(Ok(()), Err)
    }

    /// Tear the pool down, writing back every dirty page.
    ///
    /// Every write is attempted; the failures are returned together. The
    /// same drain runs on drop, where failures are only logged.
    pub fn close(mut self) -> std::result::Result<(), Vec<Error>> {
        let errors = self.drain();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    // ========================================================================
    // Public API: Stats and diagnostics
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of frames holding no page.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().frames.iter().filter(|f| f.is_free()).count()
    }

    /// Number of cached pages.
    pub fn page_count(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Whether `page_id` of `file` is cached.
    pub fn is_resident(&self, file: &FileRef, page_id: PageId) -> bool {
        self.state.lock().index.lookup(file.file_id(), page_id).is_some()
    }

    /// Pin count of a cached page, None if it is not cached.
    pub fn pin_count(&self, file: &FileRef, page_id: PageId) -> Option<u32> {
        self.with_frame(file, page_id, |f| f.pin_count())
    }

    /// Dirty flag of a cached page, None if it is not cached.
    pub fn is_dirty(&self, file: &FileRef, page_id: PageId) -> Option<bool> {
        self.with_frame(file, page_id, |f| f.is_dirty())
    }

    /// Frame holding a cached page, None if it is not cached.
    pub fn frame_of(&self, file: &FileRef, page_id: PageId) -> Option<FrameId> {
        self.state.lock().index.lookup(file.file_id(), page_id)
    }

    /// Frame the clock hand points at.
    pub fn clock_hand(&self) -> FrameId {
        self.state.lock().replacer.hand()
    }

    /// Snapshot of every frame's bookkeeping.
    pub fn frame_info(&self) -> Vec<FrameInfo> {
        let state = self.state.lock();
        state
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| FrameInfo {
                frame_id: FrameId::new(i),
                file_id: f.file_id(),
                page_id: f.page_id(),
                pin_count: f.pin_count(),
                valid: f.is_valid(),
                dirty: f.is_dirty(),
                ref_bit: f.ref_bit(),
            })
            .collect()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn pinned(&self, frame_id: FrameId, file_id: FileId, page_id: PageId) -> PinnedPage<'_> {
        PinnedPage::new(&self.pages[frame_id.0], frame_id, file_id, page_id)
    }

    fn with_frame<T>(
        &self,
        file: &FileRef,
        page_id: PageId,
        f: impl FnOnce(&FrameDescriptor) -> T,
    ) -> Option<T> {
        let state = self.state.lock();
        let frame_id = state.index.lookup(file.file_id(), page_id)?;
        Some(f(&state.frames[frame_id.0]))
    }

    /// Get a frame for a new occupant, evicting the clock's victim if needed.
    ///
    /// A dirty victim is written back and its index entry removed before
    /// its descriptor is cleared; if either step fails the victim stays
    /// resident and the error is returned.
    fn allocate_frame(&self, state: &mut PoolState<I>) -> Result<FrameId> {
        let frame_id = match state.replacer.select(&mut state.frames)? {
            ClockChoice::Free(frame_id) => return Ok(frame_id),
            ClockChoice::Victim(frame_id) => frame_id,
        };

        let victim = &mut state.frames[frame_id.0];
        let page_id = victim.page_id();

        if let Some(file) = victim.file().cloned() {
            if victim.is_dirty() {
                file.write_page(page_id, &self.pages[frame_id.0].read())?;
                victim.clear_dirty();
                self.stats.record_write();
            }
            state.index.remove(file.file_id(), page_id)?;
            debug!(file = %file.file_id(), page = %page_id, frame = %frame_id, "evicted page");
        }

        state.frames[frame_id.0].clear();
        self.stats.record_eviction();
        Ok(frame_id)
    }

    /// Best-effort write-back of every dirty frame.
    ///
    /// Each dirty flag is cleared whether or not its write succeeded, so a
    /// page is reported at most once. Takes `&mut self`: no pin or guard can
    /// be outstanding, and no lock is taken.
    fn drain(&mut self) -> Vec<Error> {
        let state = self.state.get_mut();
        let mut errors = Vec::new();

        for (frame, page) in state.frames.iter_mut().zip(self.pages.iter_mut()) {
            if !(frame.is_valid() && frame.is_dirty()) {
                continue;
            }
            let Some(file) = frame.file() else {
                continue;
            };

            match file.write_page(frame.page_id(), page.get_mut()) {
                Ok(()) => self.stats.record_write(),
                Err(err) => {
                    self.stats.record_writeback_failure();
                    errors.push(err);
                }
            }
            frame.clear_dirty();
        }

        errors
    }
}

impl<I: ResidencyIndex> Drop for BufferManager<I> {
    fn drop(&mut self) {
        for err in self.drain() {
            warn!(%err, "write-back failed during buffer pool teardown");
        }
    }
}

impl<I: ResidencyIndex> fmt::Display for BufferManager<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Buffer pool ({} frames):", self.pool_size)?;
        for info in self.frame_info() {
            write!(f, "{}\tpin_count: {}", info.frame_id, info.pin_count)?;
            if info.valid {
                if let Some(file) = info.file_id {
                    write!(f, "\t{} of {}", info.page_id, file)?;
                }
                write!(f, "\tvalid")?;
            }
            if info.dirty {
                write!(f, "\tdirty")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DiskFile, MemFile, PageFile};
    use tempfile::tempdir;

    fn mem_file() -> FileRef {
        Arc::new(MemFile::new())
    }

    /// File with `n` allocated pages, page i holding byte `i` at offset 0.
    fn file_with_pages(n: u32) -> FileRef {
        let file = mem_file();
        for i in 0..n {
            let pid = file.allocate_page().unwrap();
            let mut page = Page::new();
            page.as_mut_slice()[0] = i as u8;
            file.write_page(pid, &page).unwrap();
        }
        file
    }

    #[test]
    fn test_default_pool() {
        let bpm = BufferManager::default();
        assert_eq!(bpm.pool_size(), DEFAULT_POOL_SIZE);
        assert_eq!(bpm.free_frame_count(), DEFAULT_POOL_SIZE);
        assert_eq!(bpm.clock_hand(), FrameId::new(DEFAULT_POOL_SIZE - 1));
    }

    #[test]
    fn test_new_page() {
        let bpm = BufferManager::new(10);
        let file = mem_file();

        let p0 = bpm.new_page(&file).unwrap();
        assert_eq!(p0.page_id(), PageId::new(0));
        let p1 = bpm.new_page(&file).unwrap();
        assert_eq!(p1.page_id(), PageId::new(1));

        assert_eq!(bpm.pin_count(&file, PageId::new(0)), Some(1));
        assert_eq!(bpm.page_count(), 2);
    }

    #[test]
    fn test_fetch_miss_then_hit() {
        let bpm = BufferManager::new(4);
        let file = file_with_pages(2);

        let a = bpm.fetch_page(&file, PageId::new(1)).unwrap();
        assert_eq!(a.read().as_slice()[0], 1);
        let b = bpm.fetch_page(&file, PageId::new(1)).unwrap();

        // Same frame, pinned twice
        assert_eq!(a.frame_id(), b.frame_id());
        assert_eq!(bpm.pin_count(&file, PageId::new(1)), Some(2));

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.pages_read, 1);
    }

    #[test]
    fn test_fetch_sets_descriptor() {
        let bpm = BufferManager::new(2);
        let file = file_with_pages(1);

        let pinned = bpm.fetch_page(&file, PageId::new(0)).unwrap();
        let info = bpm.frame_info()[pinned.frame_id().0];

        assert_eq!(info.file_id, Some(file.file_id()));
        assert_eq!(info.page_id, PageId::new(0));
        assert_eq!(info.pin_count, 1);
        assert!(info.valid);
        assert!(!info.dirty);
        assert!(info.ref_bit);
    }

    #[test]
    fn test_fetch_missing_page_leaves_frame_free() {
        let bpm = BufferManager::new(2);
        let file = mem_file();

        assert!(matches!(
            bpm.fetch_page(&file, PageId::new(9)),
            Err(Error::PageNotFound(_))
        ));
        assert_eq!(bpm.free_frame_count(), 2);
        assert_eq!(bpm.page_count(), 0);
    }

    #[test]
    fn test_unpin_errors() {
        let bpm = BufferManager::new(2);
        let file = file_with_pages(1);

        assert!(matches!(
            bpm.unpin_page(&file, PageId::new(0), false),
            Err(Error::NotResident { .. })
        ));

        bpm.fetch_page(&file, PageId::new(0)).unwrap();
        bpm.unpin_page(&file, PageId::new(0), false).unwrap();
        assert!(matches!(
            bpm.unpin_page(&file, PageId::new(0), false),
            Err(Error::PageNotPinned { .. })
        ));
        assert_eq!(bpm.pin_count(&file, PageId::new(0)), Some(0));
    }

    #[test]
    fn test_dirty_flag_is_sticky() {
        let bpm = BufferManager::new(2);
        let file = file_with_pages(1);
        let pid = PageId::new(0);

        bpm.fetch_page(&file, pid).unwrap();
        bpm.fetch_page(&file, pid).unwrap();
        bpm.unpin_page(&file, pid, true).unwrap();
        bpm.unpin_page(&file, pid, false).unwrap();

        assert_eq!(bpm.is_dirty(&file, pid), Some(true));
    }

    #[test]
    fn test_new_page_does_not_zero_frame() {
        let bpm = BufferManager::new(1);
        let file = mem_file();

        let first = bpm.new_page(&file).unwrap();
        let first_id = first.page_id();
        first.write().as_mut_slice()[0] = 0x5C;
        bpm.unpin_page(&file, first_id, false).unwrap();

        // Reuses the only frame; its bytes are left as they were
        let second = bpm.new_page(&file).unwrap();
        assert_eq!(second.frame_id(), FrameId::new(0));
        assert_eq!(second.read().as_slice()[0], 0x5C);
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let bpm = BufferManager::new(1);
        let file = file_with_pages(2);

        let pinned = bpm.fetch_page(&file, PageId::new(0)).unwrap();
        pinned.write().as_mut_slice()[0] = 0x42;
        bpm.unpin_page(&file, PageId::new(0), true).unwrap();

        bpm.fetch_page(&file, PageId::new(1)).unwrap();
        assert!(!bpm.is_resident(&file, PageId::new(0)));

        let mut on_disk = Page::new();
        file.read_page(PageId::new(0), &mut on_disk).unwrap();
        assert_eq!(on_disk.as_slice()[0], 0x42);

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.pages_written, 1);
    }

    #[test]
    fn test_clean_victim_not_written() {
        let bpm = BufferManager::new(1);
        let file = file_with_pages(2);

        bpm.fetch_page(&file, PageId::new(0)).unwrap();
        bpm.unpin_page(&file, PageId::new(0), false).unwrap();
        bpm.fetch_page(&file, PageId::new(1)).unwrap();

        assert_eq!(bpm.stats().snapshot().pages_written, 0);
    }

    #[test]
    fn test_dispose_discards_dirty_copy() {
        let bpm = BufferManager::new(2);
        let file = file_with_pages(1);
        let pid = PageId::new(0);

        let pinned = bpm.fetch_page(&file, pid).unwrap();
        pinned.write().as_mut_slice()[0] = 0xEE;
        bpm.unpin_page(&file, pid, true).unwrap();

        bpm.dispose_page(&file, pid).unwrap();

        assert!(!bpm.is_resident(&file, pid));
        assert_eq!(bpm.free_frame_count(), 2);
        assert_eq!(bpm.stats().snapshot().pages_written, 0);
    }

    #[test]
    fn test_dispose_uncached_page() {
        let bpm = BufferManager::new(2);
        let file = file_with_pages(1);

        bpm.dispose_page(&file, PageId::new(0)).unwrap();
        assert!(matches!(
            bpm.dispose_page(&file, PageId::new(0)),
            Err(Error::PageNotFound(_))
        ));
    }

    #[test]
    fn test_flush_file_writes_and_evicts() {
        let bpm = BufferManager::new(4);
        let file = file_with_pages(3);
        let other = file_with_pages(1);

        for i in 0..3 {
            let pinned = bpm.fetch_page(&file, PageId::new(i)).unwrap();
            pinned.write().as_mut_slice()[1] = 0xA0 + i as u8;
            bpm.unpin_page(&file, PageId::new(i), i != 1).unwrap();
        }
        bpm.fetch_page(&other, PageId::new(0)).unwrap();

        bpm.flush_file(&file).unwrap();

        assert_eq!(bpm.page_count(), 1);
        assert!(bpm.is_resident(&other, PageId::new(0)));
        assert_eq!(bpm.stats().snapshot().pages_written, 2);

        let mut page = Page::new();
        file.read_page(PageId::new(2), &mut page).unwrap();
        assert_eq!(page.as_slice()[1], 0xA2);
        // Page 1 was never marked dirty, so its change never reached the file
        file.read_page(PageId::new(1), &mut page).unwrap();
        assert_eq!(page.as_slice()[1], 0);
    }

    #[test]
    fn test_flush_file_pinned_changes_nothing() {
        let bpm = BufferManager::new(4);
        let file = file_with_pages(3);

        for i in 0..2 {
            bpm.fetch_page(&file, PageId::new(i)).unwrap();
            bpm.unpin_page(&file, PageId::new(i), true).unwrap();
        }
        bpm.fetch_page(&file, PageId::new(2)).unwrap();

        assert!(matches!(
            bpm.flush_file(&file),
            Err(Error::PagePinned { page: PageId(2), .. })
        ));
        assert_eq!(bpm.is_dirty(&file, PageId::new(0)), Some(true));
        assert_eq!(bpm.is_dirty(&file, PageId::new(1)), Some(true));
        assert_eq!(bpm.stats().snapshot().pages_written, 0);
    }

    #[test]
    fn test_flush_file_detects_inconsistent_frame() {
        let bpm = BufferManager::new(2);
        let file = file_with_pages(1);

        bpm.fetch_page(&file, PageId::new(0)).unwrap();
        bpm.unpin_page(&file, PageId::new(0), false).unwrap();
        bpm.state.lock().frames[0].force_invalid();

        assert!(matches!(
            bpm.flush_file(&file),
            Err(Error::InconsistentFrame { frame: FrameId(0), .. })
        ));
    }

    #[test]
    fn test_flush_page_keeps_residency() {
        let bpm = BufferManager::new(2);
        let file = file_with_pages(1);
        let pid = PageId::new(0);

        let pinned = bpm.fetch_page(&file, pid).unwrap();
        pinned.write().as_mut_slice()[0] = 0x11;
        bpm.unpin_page(&file, pid, true).unwrap();

        bpm.flush_page(&file, pid).unwrap();

        assert!(bpm.is_resident(&file, pid));
        assert_eq!(bpm.is_dirty(&file, pid), Some(false));
        let mut page = Page::new();
        file.read_page(pid, &mut page).unwrap();
        assert_eq!(page.as_slice()[0], 0x11);
    }

    #[test]
    fn test_flush_all_pages() {
        let bpm = BufferManager::new(8);
        let file = mem_file();

        for i in 0..5u8 {
            let mut guard = bpm.new_page_write(&file).unwrap();
            guard.as_mut_slice()[0] = i;
        }

        bpm.flush_all_pages().unwrap();

        assert_eq!(bpm.stats().snapshot().pages_written, 5);
        assert_eq!(bpm.page_count(), 5);
    }

    #[test]
    fn test_flush_page_with_write_guard_held() {
        let bpm = BufferManager::new(4);
        let file = file_with_pages(1);
        let pid = PageId::new(0);

        bpm.fetch_page(&file, pid).unwrap();
        bpm.unpin_page(&file, pid, true).unwrap();

        let mut guard = bpm.fetch_page_write(&file, pid).unwrap();
        guard.as_mut_slice()[0] = 0x77;

        // Returns instead of waiting on the writer, and the pool stays usable
        assert!(matches!(
            bpm.flush_page(&file, pid),
            Err(Error::PagePinned { page: PageId(0), .. })
        ));
        assert_eq!(bpm.is_dirty(&file, pid), Some(true));
        assert_eq!(bpm.pin_count(&file, pid), Some(1));

        drop(guard);
        bpm.flush_page(&file, pid).unwrap();

        let mut page = Page::new();
        file.read_page(pid, &mut page).unwrap();
        assert_eq!(page.as_slice()[0], 0x77);
        assert_eq!(bpm.is_dirty(&file, pid), Some(false));
    }

    #[test]
    fn test_flush_page_with_read_guard_held() {
        let bpm = BufferManager::new(4);
        let file = file_with_pages(1);
        let pid = PageId::new(0);

        bpm.fetch_page(&file, pid).unwrap();
        bpm.unpin_page(&file, pid, true).unwrap();

        let _guard = bpm.fetch_page_read(&file, pid).unwrap();
        bpm.flush_page(&file, pid).unwrap();
        assert_eq!(bpm.is_dirty(&file, pid), Some(false));
    }

    #[test]
    fn test_flush_all_pages_skips_written_page() {
        let bpm = BufferManager::new(4);
        let file = file_with_pages(3);

        for i in 0..3 {
            bpm.fetch_page(&file, PageId::new(i)).unwrap();
            bpm.unpin_page(&file, PageId::new(i), true).unwrap();
        }

        let guard = bpm.fetch_page_write(&file, PageId::new(1)).unwrap();
        assert!(matches!(
            bpm.flush_all_pages(),
            Err(Error::PagePinned { page: PageId(1), .. })
        ));

        // Everything else went out
        assert_eq!(bpm.is_dirty(&file, PageId::new(0)), Some(false));
        assert_eq!(bpm.is_dirty(&file, PageId::new(1)), Some(true));
        assert_eq!(bpm.is_dirty(&file, PageId::new(2)), Some(false));
        assert_eq!(bpm.stats().snapshot().pages_written, 2);

        drop(guard);
        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.is_dirty(&file, PageId::new(1)), Some(false));
    }

    #[test]
    fn test_write_guard_drop_frees_frame() {
        let bpm = BufferManager::new(1);
        let file = file_with_pages(2);

        {
            let mut guard = bpm.fetch_page_write(&file, PageId::new(0)).unwrap();
            guard.as_mut_slice()[0] = 0x21;
        }

        // The only frame is free to be locked and reused right away
        assert!(bpm.state.lock().frames[0].pin_count() == 0);
        assert!(bpm.pages[0].try_write().is_some());
        let pinned = bpm.fetch_page(&file, PageId::new(1)).unwrap();
        assert_eq!(pinned.read().as_slice()[0], 1);
    }

    #[test]
    fn test_close_reports_every_failure() {
        let bpm = BufferManager::new(4);
        let file = file_with_pages(2);

        for i in 0..2 {
            bpm.fetch_page(&file, PageId::new(i)).unwrap();
            bpm.unpin_page(&file, PageId::new(i), true).unwrap();
        }
        // Disposed behind the pool's back, so its write-back fails
        file.dispose_page(PageId::new(0)).unwrap();

        let errors = bpm.close().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::PageNotFound(PageId(0))));
    }

    #[test]
    fn test_drain_counts_failures_and_clears_dirty() {
        let mut bpm = BufferManager::new(4);
        let file = file_with_pages(3);

        for i in 0..3 {
            bpm.fetch_page(&file, PageId::new(i)).unwrap();
            bpm.unpin_page(&file, PageId::new(i), true).unwrap();
        }
        file.dispose_page(PageId::new(1)).unwrap();

        let errors = bpm.drain();
        assert_eq!(errors.len(), 1);

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.writeback_failures, 1);
        assert_eq!(snapshot.pages_written, 2);
        assert!(bpm.frame_info().iter().all(|f| !f.dirty));

        // Nothing left to report on a second pass
        assert!(bpm.drain().is_empty());
    }

    #[test]
    fn test_guards_unpin_on_drop() {
        let bpm = BufferManager::new(4);
        let file = file_with_pages(1);
        let pid = PageId::new(0);

        {
            let guard = bpm.fetch_page_read(&file, pid).unwrap();
            assert_eq!(bpm.pin_count(&file, pid), Some(1));
            assert_eq!(guard.page_id(), pid);
        }
        assert_eq!(bpm.pin_count(&file, pid), Some(0));
        assert_eq!(bpm.is_dirty(&file, pid), Some(false));

        {
            let mut guard = bpm.fetch_page_write(&file, pid).unwrap();
            guard.as_mut_slice()[0] = 0xCD;
        }
        assert_eq!(bpm.pin_count(&file, pid), Some(0));
        assert_eq!(bpm.is_dirty(&file, pid), Some(true));
    }

    #[test]
    fn test_close_drains_dirty_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pid;

        {
            let file: FileRef = Arc::new(DiskFile::create(&path).unwrap());
            let bpm = BufferManager::new(4);
            let mut guard = bpm.new_page_write(&file).unwrap();
            pid = guard.page_id();
            guard.as_mut_slice()[..5].copy_from_slice(b"hello");
            drop(guard);

            bpm.close().unwrap();
        }

        let file = DiskFile::open(&path).unwrap();
        let mut page = Page::new();
        file.read_page(pid, &mut page).unwrap();
        assert_eq!(&page.as_slice()[..5], b"hello");
    }

    #[test]
    fn test_display_lists_frames() {
        let bpm = BufferManager::new(2);
        let file = file_with_pages(1);
        bpm.fetch_page(&file, PageId::new(0)).unwrap();

        let dump = format!("{}", bpm);
        assert!(dump.contains("Frame(0)\tpin_count: 1"));
        assert!(dump.contains("valid"));
        assert!(dump.contains("Frame(1)\tpin_count: 0"));
    }
}
