//! Root group of a chunk store.

use std::sync::Arc;

use crate::error::{ArrayError, StoreError};
use crate::store::{ChunkStore, GroupMetadata, RootAttributes, ATTRS_KEY, GROUP_META_KEY};

use super::lazy::LazyArray;

/// An opened group: the validated `.zgroup` plus its attributes.
#[derive(Debug, Clone)]
pub struct Group {
    store: Arc<ChunkStore>,
    attributes: RootAttributes,
}

impl Group {
    /// Open the root group of `store`.
    ///
    /// A missing `.zattrs` reads as empty attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayError::Store`] if `.zgroup` is missing and
    /// [`ArrayError::Metadata`] if either document is malformed.
    pub fn open(store: Arc<ChunkStore>) -> Result<Self, ArrayError> {
        let raw = store.get(GROUP_META_KEY)?;
        let group: GroupMetadata = parse(GROUP_META_KEY, &raw)?;
        if group.zarr_format != 2 {
            return Err(ArrayError::Metadata {
                path: GROUP_META_KEY.to_string(),
                message: format!("unsupported zarr_format {}", group.zarr_format),
            });
        }

        let attributes = match store.get(ATTRS_KEY) {
            Ok(raw) => parse(ATTRS_KEY, &raw)?,
            Err(StoreError::NotFound { .. }) => RootAttributes::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self { store, attributes })
    }

    pub fn attributes(&self) -> &RootAttributes {
        &self.attributes
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Open the array at `path` inside this group.
    pub fn open_array(&self, path: &str) -> Result<LazyArray, ArrayError> {
        LazyArray::open(Arc::clone(&self.store), path)
    }
}

fn parse<T: serde::de::DeserializeOwned>(key: &str, raw: &[u8]) -> Result<T, ArrayError> {
    serde_json::from_slice(raw).map_err(|e| ArrayError::Metadata {
        path: key.to_string(),
        message: e.to_string(),
    })
}
