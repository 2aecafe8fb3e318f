//! The page file contract consumed by the buffer manager.

use std::sync::Arc;

use crate::common::{FileId, PageId, Result};
use crate::storage::page::Page;

/// A file of fixed-size pages.
///
/// The buffer manager never touches disk itself: every read, write,
/// allocation and disposal goes through this trait. Errors are passed
/// through to the buffer manager's caller untouched.
///
/// Methods take `&self` so a file can be shared between the caller and the
/// frames that cache its pages; implementations serialize their own I/O.
pub trait PageFile: Send + Sync {
    /// Identity of this file, half of every residency key.
    fn file_id(&self) -> FileId;

    /// Read page `page_id` into `dest`.
    fn read_page(&self, page_id: PageId, dest: &mut Page) -> Result<()>;

    /// Write `src` to page `page_id`.
    fn write_page(&self, page_id: PageId, src: &Page) -> Result<()>;

    /// Allocate a page number that is not live in this file.
    fn allocate_page(&self) -> Result<PageId>;

    /// Return `page_id` to the file for reuse.
    fn dispose_page(&self, page_id: PageId) -> Result<()>;
}

/// Shared handle to a page file.
pub type FileRef = Arc<dyn PageFile>;
