//! Byte-range access to slide files.
//!
//! The TIFF parser never reads a file front to back; it asks for exact byte
//! ranges (headers, IFDs, tile payloads) through [`RangeReader`].

mod file_reader;
mod range_reader;

pub use file_reader::FileRangeReader;
pub use range_reader::RangeReader;
