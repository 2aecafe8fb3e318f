//! Disk File - a page file backed by a single OS file.
//!
//! The [`DiskFile`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating new pages, reusing disposed ones first
//! - Disposing pages

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::config::{MAX_PAGES, PAGE_SIZE};
use crate::common::{Error, FileId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::PageFile;

/// A page file stored on disk.
///
/// # File Layout
/// Pages are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// # Disposed pages
/// Disposed page numbers are kept in memory and handed out again by
/// [`allocate_page`](PageFile::allocate_page), lowest first. The set is not
/// persisted: after a reopen every page below `page_count` is live again.
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct DiskFile {
    id: FileId,
    inner: Mutex<DiskFileInner>,
}

struct DiskFileInner {
    file: File,
    /// Number of pages in the file, live or disposed.
    page_count: u32,
    /// Disposed page numbers available for reuse.
    free_pages: BTreeSet<u32>,
}

impl DiskFile {
    /// Create a new page file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_parts(file, 0))
    }

    /// Open an existing page file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self::from_parts(file, page_count))
    }

    /// Open an existing page file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn from_parts(file: File, page_count: u32) -> Self {
        Self {
            id: FileId::next(),
            inner: Mutex::new(DiskFileInner {
                file,
                page_count,
                free_pages: BTreeSet::new(),
            }),
        }
    }

    /// Number of pages in the file, including disposed ones.
    pub fn page_count(&self) -> u32 {
        self.inner.lock().page_count
    }

    /// Number of disposed pages waiting for reuse.
    pub fn free_page_count(&self) -> usize {
        self.inner.lock().free_pages.len()
    }

    /// Total size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        PageId::new(self.page_count()).offset(PAGE_SIZE)
    }
}

impl DiskFileInner {
    fn check_live(&self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.page_count || self.free_pages.contains(&page_id.0) {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    fn write_at(&mut self, page_id: PageId, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        self.file.write_all(bytes)?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl PageFile for DiskFile {
    fn file_id(&self) -> FileId {
        self.id
    }

    fn read_page(&self, page_id: PageId, dest: &mut Page) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_live(page_id)?;

        inner.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        inner.file.read_exact(dest.as_mut_slice())?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, src: &Page) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_live(page_id)?;
        inner.write_at(page_id, src.as_slice())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock();
        let zeros = [0u8; PAGE_SIZE];

        if let Some(&reused) = inner.free_pages.iter().next() {
            let page_id = PageId::new(reused);
            inner.write_at(page_id, &zeros)?;
            inner.free_pages.remove(&reused);
            debug!(file = %self.id, page = %page_id, "reused disposed page");
            return Ok(page_id);
        }

        if inner.page_count as u64 >= MAX_PAGES {
            return Err(std::io::Error::other("page file is full").into());
        }

        // Extend file with a zeroed page
        let page_id = PageId::new(inner.page_count);
        inner.write_at(page_id, &zeros)?;
        inner.page_count += 1;
        Ok(page_id)
    }

    fn dispose_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_live(page_id)?;
        inner.free_pages.insert(page_id.0);
        Ok(())
    }
}
