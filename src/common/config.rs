//! Configuration constants for the buffer manager.

/// Size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems, so a frame maps onto exactly
/// one virtual memory page and aligned I/O stays cheap.
pub const PAGE_SIZE: usize = 4096;

/// Number of frames used when a caller has no better estimate.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Maximum number of pages addressable with a u32 `PageId`.
///
/// `u32::MAX` itself is reserved as the invalid sentinel.
pub const MAX_PAGES: u64 = u32::MAX as u64;

/// Residency index capacity relative to the pool size.
///
/// The index is sized a little larger than the pool so that a full pool
/// never forces it to grow.
pub(crate) fn index_capacity(pool_size: usize) -> usize {
    pool_size + pool_size / 5 + 1
}
