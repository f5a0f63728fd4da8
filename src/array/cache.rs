//! Consumer-side chunk cache.
//!
//! The chunk store decodes on every lookup. Arrays that revisit chunks can
//! share a [`ChunkCache`], an LRU bounded by the total size of the cached
//! chunks in bytes.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use lru::LruCache;

/// Default cache capacity: 64MB
pub const DEFAULT_CHUNK_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 4_096;

// =============================================================================
// Cache Key
// =============================================================================

/// Identifies one chunk of one array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkCacheKey {
    /// Store source and array path, e.g. `/slides/a.tif#1`
    pub array: Arc<str>,
    pub row: u64,
    pub col: u64,
}

impl ChunkCacheKey {
    pub fn new(array: impl Into<Arc<str>>, row: u64, col: u64) -> Self {
        Self {
            array: array.into(),
            row,
            col,
        }
    }
}

// =============================================================================
// Chunk Cache
// =============================================================================

struct CacheState {
    entries: LruCache<ChunkCacheKey, Bytes>,
    size: usize,
}

/// Size-bounded LRU of chunk bytes, safe to share between threads.
pub struct ChunkCache {
    state: Mutex<CacheState>,
    max_size: usize,
}

impl ChunkCache {
    /// Create a cache with the default capacity (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHUNK_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache bounded by both total bytes and entry count.
    ///
    /// A `max_entries` of zero is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(max_entries),
                size: 0,
            }),
            max_size,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a chunk, marking it recently used.
    pub fn get(&self, key: &ChunkCacheKey) -> Option<Bytes> {
        self.lock().entries.get(key).cloned()
    }

    /// Whether a chunk is cached, without touching LRU order.
    pub fn contains(&self, key: &ChunkCacheKey) -> bool {
        self.lock().entries.contains(key)
    }

    /// Insert a chunk, evicting least-recently-used entries while over
    /// capacity. A chunk larger than the whole capacity is not kept.
    pub fn put(&self, key: ChunkCacheKey, data: Bytes) {
        let mut state = self.lock();
        let added = data.len();

        // push() hands back either the replaced value or the entry evicted
        // by the entry-count limit
        if let Some((_, old)) = state.entries.push(key, data) {
            state.size = state.size.saturating_sub(old.len());
        }
        state.size += added;

        while state.size > self.max_size {
            match state.entries.pop_lru() {
                Some((_, evicted)) => state.size = state.size.saturating_sub(evicted.len()),
                None => break,
            }
        }
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.size = 0;
    }

    /// Number of cached chunks.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes held.
    pub fn size(&self) -> usize {
        self.lock().size
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkCache")
            .field("entries", &self.len())
            .field("size", &self.size())
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}
