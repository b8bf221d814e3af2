//! I/O operations module
//!
//! Contains the scratch test file guard, the word-addressable chunk buffer
//! and the cache invalidation hook.

pub mod block;
pub mod cache;
pub mod disk;

pub use block::Block;
pub use cache::{drop_caches, CacheDrop};
pub use disk::{close_file, open_read_write, read_chunk, DurableFile, TestFile};
