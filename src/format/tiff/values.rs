//! TIFF tag value reading.
//!
//! Values are either stored inline in the IFD entry or at an offset in the
//! file. Arrays such as TileOffsets are fetched with a single range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Reads tag values respecting the file's byte order and offset width.
pub struct ValueReader<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Raw bytes of an entry's value, inline or fetched.
    pub fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let offset = entry.value_offset(self.header);
        Ok(self.reader.read_exact_at(offset, size as usize)?)
    }

    /// Read a Short/Long/Long8 array, widening every element to u64.
    pub fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry)?;
        parse_u64_array(&bytes, field_type, self.header)
    }

    /// Read an ASCII value, dropping the trailing NUL(s).
    pub fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let bytes = self.read_bytes(entry)?;
        let end = bytes
            .iter()
            .rposition(|&b| b != 0)
            .map(|p| p + 1)
            .unwrap_or(0);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Decode an integer array stored with `field_type`.
pub fn parse_u64_array(
    bytes: &[u8],
    field_type: FieldType,
    header: &TiffHeader,
) -> Result<Vec<u64>, TiffError> {
    let order = header.byte_order;
    let width = field_type.size_in_bytes();

    let values = match field_type {
        FieldType::Short => bytes
            .chunks_exact(width)
            .map(|c| order.read_u16(c) as u64)
            .collect(),
        FieldType::Long => bytes
            .chunks_exact(width)
            .map(|c| order.read_u32(c) as u64)
            .collect(),
        FieldType::Long8 => bytes.chunks_exact(width).map(|c| order.read_u64(c)).collect(),
        other => {
            return Err(TiffError::InvalidTagValue {
                tag: "array",
                message: format!("expected Short, Long, or Long8, got {:?}", other),
            })
        }
    };

    Ok(values)
}
