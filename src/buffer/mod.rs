//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between callers and page files.
//! It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferManager`] - The page cache and its public API
//! - [`FrameDescriptor`] - Per-frame bookkeeping (pin count, dirty, ref bit)
//! - [`ResidencyIndex`] - `(file, page) → frame` lookup
//! - [`PinnedPage`] / [`PageReadGuard`] / [`PageWriteGuard`] - Access to pinned pages
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - The CLOCK replacement policy

mod buffer_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod residency;
mod stats;

pub use buffer_manager::{BufferManager, FrameInfo};
pub use frame::FrameDescriptor;
pub use page_guard::{PageReadGuard, PageWriteGuard, PinnedPage};
pub use residency::{HashResidencyIndex, ResidencyIndex};
pub use stats::{BufferPoolStats, StatsSnapshot};
