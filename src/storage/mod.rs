//! Storage layer - page files and the page type.
//!
//! This module handles persistent storage:
//! - [`PageFile`] - The file contract the buffer manager calls into
//! - [`DiskFile`] - Page file backed by an OS file
//! - [`MemFile`] - Page file held in memory
//! - [`page`] - The raw page type

mod disk_file;
mod mem_file;
pub mod page;
mod page_file;

pub use disk_file::DiskFile;
pub use mem_file::MemFile;
pub use page_file::{FileRef, PageFile};
