//! Read-only chunk store over a slide.
//!
//! Metadata documents are built once at construction. Every chunk lookup
//! decodes exactly one `T x T` region through the slide decoder; nothing is
//! cached here, since caching belongs to whoever consumes the store.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::debug;

use crate::error::{NotFoundReason, SlideError, StoreError};
use crate::slide::{open_slide, SlideDecoder};

use super::compressor::ChunkCompressor;
use super::coords::base_origin;
use super::key::ChunkKey;
use super::metadata::{check_level_list, synthesize, MetadataEntries};

/// Default chunk edge in pixels
pub const DEFAULT_TILE_SIZE: u32 = 512;

// =============================================================================
// StoreOptions
// =============================================================================

/// Construction options for [`ChunkStore`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Chunk edge `T`; chunks are `T x T x 4` bytes
    pub tile_size: u32,

    /// Applied to every chunk and recorded in each `.zarray`
    pub compressor: Option<Arc<dyn ChunkCompressor>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            compressor: None,
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn ChunkCompressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("tile_size", &self.tile_size)
            .field("compressor", &self.compressor.as_ref().map(|c| c.config()))
            .finish()
    }
}

// =============================================================================
// ChunkStore
// =============================================================================

/// Cached geometry of one level.
#[derive(Debug, Clone, Copy)]
struct LevelGeometry {
    downsample: f64,
    rows: u64,
    cols: u64,
}

/// A slide exposed as a read-only Zarr v2 key-value store.
///
/// The store exclusively owns its decoder. Region reads and [`close`] take
/// the same lock, so closing waits for in-flight reads. Dropping the store
/// closes it.
///
/// Two stores are equal when they were opened from the same file.
///
/// [`close`]: ChunkStore::close
pub struct ChunkStore {
    decoder: Mutex<Option<Box<dyn SlideDecoder>>>,
    metadata: MetadataEntries,
    levels: Vec<LevelGeometry>,
    tile_size: u32,
    compressor: Option<Arc<dyn ChunkCompressor>>,
    source: PathBuf,
}

impl ChunkStore {
    /// Open the slide at `path` and build the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Construction`] if the slide cannot be opened or
    /// its geometry cannot be queried, and [`StoreError::InvalidTileSize`]
    /// for a zero tile size.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if options.tile_size == 0 {
            return Err(StoreError::InvalidTileSize);
        }
        let decoder = open_slide(path)?;
        let source = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self::build(decoder, source, file_name(path), options)
    }

    /// Build a store around an already opened decoder.
    ///
    /// `source` identifies the store for equality and names the multiscale.
    /// On error the decoder is closed before returning.
    pub fn from_decoder(
        decoder: Box<dyn SlideDecoder>,
        source: impl Into<PathBuf>,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let source = source.into();
        let name = file_name(&source);
        Self::build(decoder, source, name, options)
    }

    fn build(
        mut decoder: Box<dyn SlideDecoder>,
        source: PathBuf,
        name: Option<String>,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let built = Self::describe(decoder.as_ref(), name.as_deref(), &options);
        let (metadata, levels) = match built {
            Ok(parts) => parts,
            Err(e) => {
                decoder.close();
                return Err(e);
            }
        };

        debug!(
            source = %source.display(),
            levels = levels.len(),
            tile_size = options.tile_size,
            "opened chunk store"
        );

        Ok(Self {
            decoder: Mutex::new(Some(decoder)),
            metadata,
            levels,
            tile_size: options.tile_size,
            compressor: options.compressor,
            source,
        })
    }

    fn describe(
        decoder: &dyn SlideDecoder,
        name: Option<&str>,
        options: &StoreOptions,
    ) -> Result<(MetadataEntries, Vec<LevelGeometry>), StoreError> {
        if options.tile_size == 0 {
            return Err(StoreError::InvalidTileSize);
        }
        let t = options.tile_size as u64;

        let metadata = synthesize(decoder, options.tile_size, options.compressor.as_deref(), name)?;

        let dimensions = decoder.level_dimensions()?;
        let downsamples = decoder.level_downsamples()?;
        check_level_list("downsamples", downsamples.len(), dimensions.len())?;
        let levels = dimensions
            .iter()
            .zip(downsamples.iter())
            .map(|(&(width, height), &downsample)| LevelGeometry {
                downsample,
                rows: height.div_ceil(t),
                cols: width.div_ceil(t),
            })
            .collect();

        Ok((metadata, levels))
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Fetch the bytes stored under `key`.
    ///
    /// Metadata keys return their document verbatim. Chunk keys decode one
    /// region and return `T * T * 4` RGBA bytes in row-major order (or the
    /// compressor's encoding of them).
    ///
    /// # Errors
    ///
    /// Every way a key can be unavailable, from a malformed key to a decode
    /// failure or a closed store, is reported as [`StoreError::NotFound`].
    pub fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        if let Some(doc) = self.metadata.get(key) {
            return Ok(doc.clone());
        }

        let chunk =
            ChunkKey::parse(key).ok_or_else(|| self.missing(key, NotFoundReason::Malformed))?;
        let level = self
            .levels
            .get(chunk.level)
            .ok_or_else(|| self.missing(key, NotFoundReason::LevelOutOfRange))?;
        if chunk.row >= level.rows || chunk.col >= level.cols {
            return Err(self.missing(key, NotFoundReason::ChunkOutOfGrid));
        }

        let (x, y) = base_origin(chunk.row, chunk.col, level.downsample, self.tile_size);

        let region = {
            let guard = self.lock();
            let decoder = guard
                .as_ref()
                .ok_or_else(|| self.missing(key, NotFoundReason::Closed))?;
            decoder
                .read_region(x, y, chunk.level, self.tile_size, self.tile_size)
                .map_err(|e| self.decode_failure(key, e))?
        };
        let raw = region.into_raw();

        match &self.compressor {
            Some(compressor) => {
                let encoded = compressor
                    .encode(&raw)
                    .map_err(|message| StoreError::Compression {
                        key: key.to_string(),
                        message,
                    })?;
                Ok(Bytes::from(encoded))
            }
            None => Ok(Bytes::from(raw)),
        }
    }

    /// Whether `key` names a metadata document or a chunk of an existing
    /// level. The chunk itself is not checked.
    pub fn contains(&self, key: &str) -> bool {
        if self.metadata.contains(key) {
            return true;
        }
        ChunkKey::parse(key).is_some_and(|chunk| chunk.level < self.levels.len())
    }

    /// Metadata keys; chunk keys are never enumerated.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.metadata.keys()
    }

    /// Number of metadata keys.
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Release the decoder. Blocks until in-flight reads finish; later
    /// chunk lookups report `NotFound`. Calling it again does nothing.
    pub fn close(&self) {
        let mut guard = self.lock();
        if let Some(mut decoder) = guard.take() {
            decoder.close();
            debug!(source = %self.source.display(), "closed chunk store");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Path the store was opened from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// A copy of a decoder property, `None` if absent or closed.
    pub fn property(&self, name: &str) -> Option<String> {
        self.lock()
            .as_ref()
            .and_then(|d| d.properties().get(name).cloned())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn SlideDecoder>>> {
        // A panic mid-read leaves the decoder itself untouched
        self.decoder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn missing(&self, key: &str, reason: NotFoundReason) -> StoreError {
        debug!(key, %reason, source = %self.source.display(), "chunk lookup failed");
        StoreError::not_found(key, reason)
    }

    fn decode_failure(&self, key: &str, err: SlideError) -> StoreError {
        let reason = match err {
            SlideError::Closed => NotFoundReason::Closed,
            _ => NotFoundReason::Decode,
        };
        debug!(key, error = %err, "region read failed");
        self.missing(key, reason)
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

impl Drop for ChunkStore {
    fn drop(&mut self) {
        self.close();
    }
}

impl PartialEq for ChunkStore {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for ChunkStore {}

impl Hash for ChunkStore {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStore")
            .field("source", &self.source)
            .field("tile_size", &self.tile_size)
            .field("levels", &self.levels.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
