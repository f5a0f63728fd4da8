//! Zarr v2 chunk store over a pyramidal slide.
//!
//! Each pyramid level becomes one `[H, W, 4]` `u8` array chunked into
//! `T x T x 4` tiles:
//!
//! ```text
//! chunk (level, row, col)
//!      │ base_origin: x = col·d·T, y = row·d·T
//!      ▼
//! decoder.read_region(x, y, level, T, T)
//!      │ RGBA, row-major
//!      ▼
//! optional ChunkCompressor ──► bytes
//! ```

mod chunk_store;
mod compressor;
mod coords;
mod key;
mod metadata;

pub use chunk_store::{ChunkStore, StoreOptions, DEFAULT_TILE_SIZE};
pub use compressor::ChunkCompressor;
pub use coords::base_origin;
pub use key::{array_meta_key, ChunkKey, ARRAY_META_KEY, ATTRS_KEY, GROUP_META_KEY};
pub use metadata::{
    synthesize, ArrayMetadata, Dataset, GroupMetadata, MetadataEntries, Multiscale, Order,
    RootAttributes, CHANNELS, DTYPE_U8, MULTISCALES_VERSION, ZARR_FORMAT,
};
