//! Lazily loaded arrays over a chunk store.
//!
//! Opening an array reads only its `.zarray` document. Chunks are fetched
//! one lookup at a time when [`LazyArray::chunk`] or
//! [`LazyArray::read_region`] asks for them.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::trace;

use crate::error::{ArrayError, StoreError};
use crate::store::{ArrayMetadata, ChunkStore, Order, ARRAY_META_KEY, DTYPE_U8};

use super::cache::{ChunkCache, ChunkCacheKey};

/// A `[height, width, channels]` byte array backed by a chunk store.
#[derive(Clone)]
pub struct LazyArray {
    store: Arc<ChunkStore>,
    path: String,
    metadata: ArrayMetadata,
    cache: Option<Arc<ChunkCache>>,

    /// Prefix of this array's cache keys
    cache_id: Arc<str>,
}

impl LazyArray {
    /// Open the array stored under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayError::Store`] if `<path>/.zarray` is missing, and
    /// [`ArrayError::Metadata`] if it does not describe a C-order `|u1`
    /// array of rank 3 whose chunks span every channel.
    pub fn open(store: Arc<ChunkStore>, path: impl Into<String>) -> Result<Self, ArrayError> {
        let path = path.into();
        let key = meta_key(&path);
        let raw = store.get(&key)?;

        let metadata: ArrayMetadata =
            serde_json::from_slice(&raw).map_err(|e| ArrayError::Metadata {
                path: key.clone(),
                message: e.to_string(),
            })?;
        validate(&metadata).map_err(|message| ArrayError::Metadata {
            path: key,
            message,
        })?;

        let cache_id: Arc<str> = format!("{}#{}", store.source().display(), path).into();

        Ok(Self {
            store,
            path,
            metadata,
            cache: None,
            cache_id,
        })
    }

    /// Keep fetched chunks in `cache`.
    pub fn with_cache(mut self, cache: Arc<ChunkCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    pub fn shape(&self) -> &[u64] {
        &self.metadata.shape
    }

    pub fn chunks(&self) -> &[u64] {
        &self.metadata.chunks
    }

    pub fn dtype(&self) -> &str {
        &self.metadata.dtype
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Number of chunks along each dimension.
    pub fn grid_shape(&self) -> Vec<u64> {
        self.metadata
            .shape
            .iter()
            .zip(&self.metadata.chunks)
            .map(|(&s, &c)| s.div_ceil(c))
            .collect()
    }

    /// Bytes in one (uncompressed) chunk.
    pub fn chunk_len(&self) -> usize {
        self.metadata.chunks.iter().product::<u64>() as usize
    }

    fn fill_byte(&self) -> u8 {
        match &self.metadata.fill_value {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as u8,
            _ => 0,
        }
    }

    // -------------------------------------------------------------------------
    // Chunk Access
    // -------------------------------------------------------------------------

    /// Store key of chunk `(row, col)`.
    pub fn chunk_key(&self, row: u64, col: u64) -> String {
        format!("{}/{}.{}.0", self.path, row, col)
    }

    /// Fetch chunk `(row, col)` as stored.
    ///
    /// A chunk the store reports as not found reads as a chunk of fill
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayError::ChunkOutOfBounds`] for indices outside the chunk
    /// grid; store errors other than not-found propagate.
    pub fn chunk(&self, row: u64, col: u64) -> Result<Bytes, ArrayError> {
        let grid = self.grid_shape();
        if row >= grid[0] || col >= grid[1] {
            return Err(ArrayError::ChunkOutOfBounds {
                row,
                col,
                rows: grid[0],
                cols: grid[1],
            });
        }

        let cache_key = ChunkCacheKey::new(Arc::clone(&self.cache_id), row, col);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&cache_key)) {
            return Ok(hit);
        }

        let key = self.chunk_key(row, col);
        match self.store.get(&key) {
            Ok(bytes) => {
                if let Some(cache) = &self.cache {
                    cache.put(cache_key, bytes.clone());
                }
                Ok(bytes)
            }
            Err(StoreError::NotFound { reason, .. }) => {
                trace!(key = %key, %reason, "missing chunk read as fill value");
                Ok(Bytes::from(vec![self.fill_byte(); self.chunk_len()]))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Assemble the `height x width` window at `(y, x)` across every
    /// channel, row-major.
    ///
    /// Only touched chunks are fetched; edge chunks are clipped to the array
    /// shape.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayError::RegionOutOfBounds`] if the window leaves the
    /// array, [`ArrayError::Metadata`] for compressed arrays, and
    /// [`ArrayError::ChunkSize`] if a chunk has the wrong length.
    pub fn read_region(
        &self,
        y: u64,
        x: u64,
        height: u64,
        width: u64,
    ) -> Result<Vec<u8>, ArrayError> {
        let shape = &self.metadata.shape;
        let fits = y.checked_add(height).is_some_and(|end| end <= shape[0])
            && x.checked_add(width).is_some_and(|end| end <= shape[1]);
        if !fits {
            return Err(ArrayError::RegionOutOfBounds {
                y,
                x,
                height,
                width,
                shape: shape.clone(),
            });
        }
        if let Some(compressor) = &self.metadata.compressor {
            return Err(ArrayError::Metadata {
                path: meta_key(&self.path),
                message: format!("cannot assemble regions of compressed chunks ({})", compressor),
            });
        }

        let channels = shape[2] as usize;
        let mut out = vec![0u8; height as usize * width as usize * channels];
        if height == 0 || width == 0 {
            return Ok(out);
        }

        let (ch, cw) = (self.metadata.chunks[0], self.metadata.chunks[1]);
        let out_stride = width as usize * channels;
        let chunk_stride = cw as usize * channels;

        for row in (y / ch)..=((y + height - 1) / ch) {
            for col in (x / cw)..=((x + width - 1) / cw) {
                let chunk = self.chunk(row, col)?;
                if chunk.len() != self.chunk_len() {
                    return Err(ArrayError::ChunkSize {
                        key: self.chunk_key(row, col),
                        actual: chunk.len(),
                        expected: self.chunk_len(),
                    });
                }

                // Overlap of this chunk with the window, in array coordinates
                let y0 = y.max(row * ch);
                let y1 = (y + height).min((row + 1) * ch);
                let x0 = x.max(col * cw);
                let x1 = (x + width).min((col + 1) * cw);
                let run = (x1 - x0) as usize * channels;

                for ay in y0..y1 {
                    let src = (ay - row * ch) as usize * chunk_stride
                        + (x0 - col * cw) as usize * channels;
                    let dst = (ay - y) as usize * out_stride + (x0 - x) as usize * channels;
                    out[dst..dst + run].copy_from_slice(&chunk[src..src + run]);
                }
            }
        }

        Ok(out)
    }
}

impl fmt::Debug for LazyArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyArray")
            .field("source", &self.store.source())
            .field("path", &self.path)
            .field("shape", &self.metadata.shape)
            .field("chunks", &self.metadata.chunks)
            .finish()
    }
}

fn meta_key(path: &str) -> String {
    if path.is_empty() {
        ARRAY_META_KEY.to_string()
    } else {
        format!("{}/{}", path, ARRAY_META_KEY)
    }
}

fn validate(meta: &ArrayMetadata) -> Result<(), String> {
    if meta.dtype != DTYPE_U8 {
        return Err(format!("unsupported dtype {}", meta.dtype));
    }
    if meta.order != Order::C {
        return Err("only C order is supported".to_string());
    }
    if meta.shape.len() != 3 || meta.chunks.len() != 3 {
        return Err(format!(
            "expected rank 3, got shape {:?} and chunks {:?}",
            meta.shape, meta.chunks
        ));
    }
    if meta.chunks.contains(&0) {
        return Err("chunk dimensions must be positive".to_string());
    }
    if meta.chunks[2] != meta.shape[2] {
        return Err("chunks must span every channel".to_string());
    }
    Ok(())
}
