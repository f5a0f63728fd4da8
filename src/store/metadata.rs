//! Zarr v2 metadata documents.
//!
//! The store describes itself with three kinds of JSON documents:
//!
//! - `.zgroup`: `{"zarr_format": 2}`
//! - `.zattrs`: a `multiscales` list naming one dataset per pyramid level
//! - `<level>/.zarray`: shape `[H, W, 4]`, chunks `[T, T, 4]`, `|u1` pixels
//!
//! All of them are serialized once, when the store is built.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SlideError, StoreError};
use crate::slide::SlideDecoder;

use super::compressor::ChunkCompressor;
use super::key::{array_meta_key, ATTRS_KEY, GROUP_META_KEY};

/// Version written to every descriptor
pub const ZARR_FORMAT: u32 = 2;

/// Version of the multiscales attribute layout
pub const MULTISCALES_VERSION: &str = "0.1";

/// Unsigned byte, endianness not applicable
pub const DTYPE_U8: &str = "|u1";

/// RGBA
pub const CHANNELS: u64 = 4;

// =============================================================================
// Documents
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub zarr_format: u32,
}

/// Memory layout of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Row-major: the last dimension varies fastest
    C,
    /// Column-major: the first dimension varies fastest
    F,
}

/// Contents of a `.zarray` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    pub dtype: String,

    /// Value of unwritten regions; `null` when unspecified
    pub fill_value: Option<Value>,

    pub order: Order,

    /// Codec configuration, `null` for raw chunks
    pub compressor: Option<Value>,

    pub filters: Option<Vec<Value>>,
    pub zarr_format: u32,
}

impl ArrayMetadata {
    /// Descriptor for one RGBA pyramid level.
    pub fn rgba_level(width: u64, height: u64, tile_size: u32, compressor: Option<Value>) -> Self {
        let t = tile_size as u64;
        Self {
            shape: vec![height, width, CHANNELS],
            chunks: vec![t, t, CHANNELS],
            dtype: DTYPE_U8.to_string(),
            fill_value: Some(Value::from(0)),
            order: Order::C,
            compressor,
            filters: None,
            zarr_format: ZARR_FORMAT,
        }
    }
}

/// One entry of a multiscale's dataset list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub path: String,
}

/// A multiscale image: datasets ordered from highest to lowest resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multiscale {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub datasets: Vec<Dataset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Contents of the root `.zattrs`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RootAttributes {
    #[serde(default)]
    pub multiscales: Vec<Multiscale>,
}

// =============================================================================
// MetadataEntries
// =============================================================================

/// Immutable key to serialized-document map.
#[derive(Debug, Clone, Default)]
pub struct MetadataEntries {
    entries: BTreeMap<String, Bytes>,
}

impl MetadataEntries {
    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_json<T: Serialize>(&mut self, key: String, doc: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(doc).map_err(|e| StoreError::Metadata {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.entries.insert(key, Bytes::from(bytes));
        Ok(())
    }
}

/// Build every metadata document for `decoder`.
///
/// `name` becomes the multiscale's name (the source file name).
///
/// # Errors
///
/// Any failing geometry query, or a decoder whose level lists disagree with
/// its level count, aborts with [`StoreError::Construction`].
pub fn synthesize(
    decoder: &dyn SlideDecoder,
    tile_size: u32,
    compressor: Option<&dyn ChunkCompressor>,
    name: Option<&str>,
) -> Result<MetadataEntries, StoreError> {
    let level_count = decoder.level_count()?;
    let dimensions = decoder.level_dimensions()?;
    check_level_list("dimensions", dimensions.len(), level_count)?;
    let compressor_config = compressor.map(|c| c.config());

    let mut entries = MetadataEntries::default();

    entries.insert_json(
        GROUP_META_KEY.to_string(),
        &GroupMetadata {
            zarr_format: ZARR_FORMAT,
        },
    )?;

    let attrs = RootAttributes {
        multiscales: vec![Multiscale {
            name: name.map(str::to_string),
            datasets: (0..level_count)
                .map(|level| Dataset {
                    path: level.to_string(),
                })
                .collect(),
            version: Some(MULTISCALES_VERSION.to_string()),
        }],
    };
    entries.insert_json(ATTRS_KEY.to_string(), &attrs)?;

    for (level, &(width, height)) in dimensions.iter().enumerate() {
        let meta = ArrayMetadata::rgba_level(width, height, tile_size, compressor_config.clone());
        entries.insert_json(array_meta_key(level), &meta)?;
    }

    Ok(entries)
}

/// Fail construction when a per-level list does not cover every level.
pub(crate) fn check_level_list(
    what: &str,
    len: usize,
    level_count: usize,
) -> Result<(), StoreError> {
    if len == level_count {
        return Ok(());
    }
    Err(StoreError::Construction(SlideError::Unsupported {
        reason: format!("decoder reports {len} level {what} for {level_count} levels"),
    }))
}
