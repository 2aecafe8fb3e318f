//! Page type.
//!
//! A [`Page`] is an opaque 4KB byte block. Its layout belongs to whoever
//! owns the file; the buffer manager only copies it between disk and memory.

#[allow(clippy::module_inception)]
mod page;

pub use page::Page;
