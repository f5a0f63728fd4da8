//! # slide-zarr
//!
//! Pyramidal whole-slide images exposed as read-only, lazily decoded Zarr v2
//! stores.
//!
//! A slide with several resolution levels becomes a Zarr group whose arrays
//! `0`, `1`, ... hold the levels as `[H, W, 4]` RGBA `u8` data. Only metadata
//! is built up front; each chunk is decoded from the slide when it is asked
//! for, so multi-gigabyte slides open instantly.
//!
//! ## Features
//!
//! - **Lazy chunks**: one `T x T` region decoded per chunk lookup
//! - **Format gate**: accepts pyramidal `.tif`/`.tiff`, leaves OME-TIFF and
//!   single-level images to other readers
//! - **Native TIFF decoder**: classic TIFF and BigTIFF, JPEG or uncompressed
//!   tiles, Aperio SVS descriptions
//! - **HTTP front**: serves a slide directory as Zarr over HTTP
//!
//! ## Architecture
//!
//! - [`io`] - Byte-range file access
//! - [`mod@format`] - TIFF parsing, JPEG tables, tile decompression
//! - [`slide`] - The [`SlideDecoder`] contract and the TIFF implementation
//! - [`store`] - The chunk store and Zarr metadata synthesis
//! - [`array`] - Lazy arrays and the consumer-side chunk cache
//! - [`reader`] - Format gate and pyramid assembly
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use slide_zarr::reader::{detect, Source};
//!
//! let source = Source::from(Path::new("slide.tif"));
//! if let Some(read) = detect(&source).unwrap() {
//!     let layers = read(Path::new("slide.tif")).unwrap();
//!     let full_resolution = &layers[0].pyramid[0];
//!     println!("shape: {:?}", full_resolution.shape());
//!
//!     // Decodes only the chunks touched by the region
//!     let pixels = full_resolution.read_region(0, 0, 256, 256).unwrap();
//!     assert_eq!(pixels.len(), 256 * 256 * 4);
//! }
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod reader;
pub mod server;
pub mod slide;
pub mod store;

// Re-export commonly used types
pub use array::{ChunkCache, Group, LazyArray};
pub use config::{Cli, Command, ServeConfig};
pub use error::{
    ArrayError, GateError, IoError, NotFoundReason, ReaderError, RegistryError, SlideError,
    StoreError, TiffError,
};
pub use io::{FileRangeReader, RangeReader};
pub use reader::{detect, read, LayerData, LayerMeta, ReaderFn, Source};
pub use server::{create_router, AppState, RouterConfig, StoreRegistry};
pub use slide::{open_slide, SlideDecoder, TiffSlide};
pub use store::{ChunkCompressor, ChunkKey, ChunkStore, StoreOptions};
