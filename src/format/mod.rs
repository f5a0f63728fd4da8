//! Slide file formats.
//!
//! - [`tiff`]: TIFF/BigTIFF structure and pyramid identification
//! - [`jpeg`]: abbreviated JPEG streams with shared tables
//! - [`codec`]: tile decompression to RGBA pixels

pub mod codec;
pub mod jpeg;
pub mod tiff;

pub use codec::{check_level_supported, decode_tile};
pub use jpeg::{is_abbreviated_stream, merge_jpeg_tables, prepare_tile_jpeg};
