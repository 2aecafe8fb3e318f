//! In-memory page file.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::common::config::MAX_PAGES;
use crate::common::{Error, FileId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::PageFile;

/// A page file whose pages live on the heap.
///
/// Same allocation and disposal rules as [`DiskFile`](super::DiskFile),
/// without touching the filesystem. Useful for scratch relations and tests.
pub struct MemFile {
    id: FileId,
    inner: Mutex<MemFileInner>,
}

#[derive(Default)]
struct MemFileInner {
    pages: Vec<Box<Page>>,
    free_pages: BTreeSet<u32>,
}

impl MemFile {
    /// Create an empty in-memory file.
    pub fn new() -> Self {
        Self {
            id: FileId::next(),
            inner: Mutex::new(MemFileInner::default()),
        }
    }

    /// Number of pages in the file, including disposed ones.
    pub fn page_count(&self) -> u32 {
        self.inner.lock().pages.len() as u32
    }

    /// Number of disposed pages waiting for reuse.
    pub fn free_page_count(&self) -> usize {
        self.inner.lock().free_pages.len()
    }
}

impl Default for MemFile {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFileInner {
    fn live_page(&mut self, page_id: PageId) -> Result<&mut Page> {
        if self.free_pages.contains(&page_id.0) {
            return Err(Error::PageNotFound(page_id));
        }
        self.pages
            .get_mut(page_id.0 as usize)
            .map(|page| &mut **page)
            .ok_or(Error::PageNotFound(page_id))
    }
}

impl PageFile for MemFile {
    fn file_id(&self) -> FileId {
        self.id
    }

    fn read_page(&self, page_id: PageId, dest: &mut Page) -> Result<()> {
        let mut inner = self.inner.lock();
        dest.copy_from(inner.live_page(page_id)?);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, src: &Page) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.live_page(page_id)?.copy_from(src);
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock();

        if let Some(reused) = inner.free_pages.pop_first() {
            inner.pages[reused as usize].reset();
            return Ok(PageId::new(reused));
        }

        if inner.pages.len() as u64 >= MAX_PAGES {
            return Err(std::io::Error::other("page file is full").into());
        }

        inner.pages.push(Box::new(Page::new()));
        Ok(PageId::new(inner.pages.len() as u32 - 1))
    }

    fn dispose_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.live_page(page_id)?;
        inner.free_pages.insert(page_id.0);
        Ok(())
    }
}
