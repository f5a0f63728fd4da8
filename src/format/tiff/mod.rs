//! Native TIFF / BigTIFF parsing for pyramidal slides.
//!
//! - **Byte order**: II = little-endian, MM = big-endian; every multi-byte
//!   value is read through [`ByteOrder`].
//! - **Classic TIFF vs BigTIFF**: 32-bit vs 64-bit offsets, handled
//!   transparently by [`TiffHeader`].
//! - **Pyramid**: each tiled IFD is one resolution level, see [`TiffPyramid`].

mod parser;
mod pyramid;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{PyramidLevel, TiffPyramid, TileData};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::{parse_u64_array, ValueReader};
