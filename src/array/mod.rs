//! Minimal lazy chunked-array consumer.
//!
//! Opens a store's root [`Group`], resolves datasets to [`LazyArray`]s and
//! fetches chunks on demand, optionally through a shared [`ChunkCache`].

mod cache;
mod group;
mod lazy;

pub use cache::{ChunkCache, ChunkCacheKey, DEFAULT_CHUNK_CACHE_CAPACITY};
pub use group::Group;
pub use lazy::LazyArray;
