//! Pyramid assembly: one lazy array per resolution level.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::array::{ChunkCache, Group, LazyArray};
use crate::error::ReaderError;
use crate::store::{ChunkStore, StoreOptions};

// =============================================================================
// Layer Data
// =============================================================================

/// Display metadata of a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerMeta {
    /// Source file name
    pub name: String,
}

/// A multiscale image layer.
#[derive(Debug, Clone)]
pub struct LayerData {
    /// Index 0 is full resolution; each following array is coarser
    pub pyramid: Vec<LazyArray>,
    pub meta: LayerMeta,
}

impl LayerData {
    /// The shared store behind every level, if any level exists.
    pub fn store(&self) -> Option<&Arc<ChunkStore>> {
        self.pyramid.first().map(LazyArray::store)
    }
}

// =============================================================================
// Reader Options
// =============================================================================

/// Options for [`read_with_options`].
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    pub store: StoreOptions,

    /// Shared by every level of the layer
    pub cache: Option<Arc<ChunkCache>>,
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store_options(mut self, store: StoreOptions) -> Self {
        self.store = store;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ChunkCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Read the slide at `path` as one multiscale layer.
///
/// Only metadata is read; no chunk is decoded until a level is accessed.
///
/// # Errors
///
/// Returns [`ReaderError::Store`] if the store cannot be constructed.
pub fn read(path: &Path) -> Result<Vec<LayerData>, ReaderError> {
    read_with_options(path, ReaderOptions::default())
}

/// [`read`] with explicit store and cache options.
pub fn read_with_options(
    path: &Path,
    options: ReaderOptions,
) -> Result<Vec<LayerData>, ReaderError> {
    let store = ChunkStore::open(path, options.store)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    assemble(Arc::new(store), name, options.cache)
}

/// Wire a store into lazy arrays, following the root multiscales attribute.
pub fn assemble(
    store: Arc<ChunkStore>,
    name: String,
    cache: Option<Arc<ChunkCache>>,
) -> Result<Vec<LayerData>, ReaderError> {
    let group = Group::open(store)?;
    let multiscale = group
        .attributes()
        .multiscales
        .first()
        .ok_or(ReaderError::NoMultiscales)?;

    let pyramid = multiscale
        .datasets
        .iter()
        .map(|dataset| {
            let array = group.open_array(&dataset.path)?;
            Ok(match &cache {
                Some(cache) => array.with_cache(Arc::clone(cache)),
                None => array,
            })
        })
        .collect::<Result<Vec<_>, ReaderError>>()?;

    debug!(name = %name, levels = pyramid.len(), "assembled pyramid");

    Ok(vec![LayerData {
        pyramid,
        meta: LayerMeta { name },
    }])
}
