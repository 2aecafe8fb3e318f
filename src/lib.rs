//! clockpool - a buffer manager for disk-oriented storage engines.
//!
//! Holds a bounded number of pages in memory, mediates every access to
//! them, and picks victims under memory pressure with the CLOCK
//! (second-chance) approximation of LRU.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  callers (access methods, heap files)           │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferManager + FrameDescriptor + ResidencyIndex       │   │
//! │  │        ClockReplacer + page guards + statistics          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │        PageFile trait: DiskFile | MemFile + Page         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, FileId, Error, config)
//! - [`buffer`] - Buffer pool management and the replacement policy
//! - [`storage`] - Page files and the page type
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use clockpool::{BufferManager, DiskFile, FileRef};
//!
//! let file: FileRef = Arc::new(DiskFile::create("my_relation.db").unwrap());
//! let bpm = BufferManager::new(16);
//!
//! let mut guard = bpm.new_page_write(&file).unwrap();
//! guard.as_mut_slice()[0] = 0x01;
//! drop(guard);
//!
//! bpm.flush_file(&file).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

pub use common::config::PAGE_SIZE;
pub use common::{Error, FileId, FrameId, IndexError, PageId, Result};

pub use buffer::{
    BufferManager, BufferPoolStats, FrameInfo, HashResidencyIndex, PageReadGuard,
    PageWriteGuard, PinnedPage, ResidencyIndex, StatsSnapshot,
};
pub use storage::page::Page;
pub use storage::{DiskFile, FileRef, MemFile, PageFile};
