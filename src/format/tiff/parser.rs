//! TIFF header and IFD parsing.
//!
//! # Layout
//!
//! ```text
//! Classic TIFF header (8 bytes):   II|MM, 42, u32 first IFD offset
//! BigTIFF header     (16 bytes):   II|MM, 43, u16 8, u16 0, u64 first IFD offset
//!
//! IFD:  count (u16 | u64), count * entry (12 | 20 bytes), next offset (u32 | u64)
//! entry: tag u16, type u16, count (u32 | u64), value-or-offset (4 | 8 bytes)
//! ```

use std::collections::HashMap;

use crate::error::TiffError;

use super::tags::{FieldType, TiffTag};

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

const VERSION_TIFF: u16 = 42;
const VERSION_BIGTIFF: u16 = 43;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) declared by the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II"
    LittleEndian,
    /// "MM"
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from the start of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 2 bytes.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    /// Read a u32 from the start of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 4 bytes.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    /// Read a u64 from the start of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 8 bytes.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(raw),
            ByteOrder::BigEndian => u64::from_be_bytes(raw),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,

    /// 64-bit offsets and 20-byte IFD entries
    pub is_bigtiff: bool,

    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from the first bytes of a file.
    ///
    /// # Errors
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 or 43
    /// - `InvalidBigTiffOffsetSize` if BigTIFF offset size is not 8
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let byte_order = match &bytes[0..2] {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => {
                return Err(TiffError::InvalidMagic(u16::from_le_bytes([
                    bytes[0], bytes[1],
                ])))
            }
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        let (is_bigtiff, first_ifd_offset) = match version {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            other => return Err(TiffError::InvalidVersion(other)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Size of one IFD entry: 12 bytes classic, 20 bytes BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count that opens an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of an offset field (next IFD pointer, value-or-offset slot).
    #[inline]
    pub const fn offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Read an offset-sized value.
    #[inline]
    pub fn read_offset(&self, bytes: &[u8]) -> u64 {
        if self.is_bigtiff {
            self.byte_order.read_u64(bytes)
        } else {
            self.byte_order.read_u32(bytes) as u64
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// A single tag entry inside an IFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,

    /// `None` for field types this parser does not know
    pub field_type: Option<FieldType>,

    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// Raw value-or-offset slot, 4 or 8 bytes
    pub value_offset_bytes: Vec<u8>,

    /// Whether the value lives in `value_offset_bytes` itself
    pub is_inline: bool,
}

impl IfdEntry {
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let order = header.byte_order;
        let tag_id = order.read_u16(&bytes[0..2]);
        let field_type_raw = order.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, slot) = if header.is_bigtiff {
            (order.read_u64(&bytes[4..12]), &bytes[12..20])
        } else {
            (order.read_u32(&bytes[4..8]) as u64, &bytes[8..12])
        };

        let is_inline = field_type
            .and_then(|t| (t.size_in_bytes() as u64).checked_mul(count))
            .is_some_and(|total| total <= header.offset_size() as u64);

        IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes: slot.to_vec(),
            is_inline,
        }
    }

    /// Total byte size of the value, if the field type is known.
    pub fn value_byte_size(&self) -> Option<u64> {
        let field_type = self.field_type?;
        (field_type.size_in_bytes() as u64).checked_mul(self.count)
    }

    /// Interpret the slot as a file offset.
    pub fn value_offset(&self, header: &TiffHeader) -> u64 {
        header.read_offset(&self.value_offset_bytes)
    }

    /// Read a single inline Short/Long/Long8 value.
    pub fn inline_u64(&self, order: ByteOrder) -> Option<u64> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(order.read_u16(&self.value_offset_bytes) as u64),
            FieldType::Long => Some(order.read_u32(&self.value_offset_bytes) as u64),
            FieldType::Long8 => Some(order.read_u64(&self.value_offset_bytes)),
            _ => None,
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, Default)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,

    /// Tag id → index into `entries`
    pub entries_by_tag: HashMap<u16, usize>,

    /// Offset of the next IFD; 0 ends the chain
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Byte size of an IFD with `entry_count` entries.
    ///
    /// # Errors
    ///
    /// Returns [`TiffError::InvalidEntryCount`] if the size overflows.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> Result<usize, TiffError> {
        usize::try_from(entry_count)
            .ok()
            .and_then(|count| count.checked_mul(header.ifd_entry_size()))
            .and_then(|entries| entries.checked_add(header.ifd_count_size()))
            .and_then(|size| size.checked_add(header.offset_size()))
            .ok_or(TiffError::InvalidEntryCount(entry_count))
    }

    /// Parse an IFD from bytes starting at its entry count.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_count = if header.is_bigtiff {
            header.byte_order.read_u64(bytes)
        } else {
            header.byte_order.read_u16(bytes) as u64
        };

        let required = Self::calculate_size(entry_count, header)?;
        if bytes.len() < required {
            return Err(TiffError::FileTooSmall {
                required: required as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut entries_by_tag = HashMap::new();

        for i in 0..entry_count as usize {
            let start = count_size + i * entry_size;
            let entry = IfdEntry::parse(&bytes[start..start + entry_size], header);
            entries_by_tag.entry(entry.tag_id).or_insert(i);
            entries.push(entry);
        }

        let next_start = count_size + entry_count as usize * entry_size;
        let next_ifd_offset = header.read_offset(&bytes[next_start..]);

        Ok(Ifd {
            entries,
            entries_by_tag,
            next_ifd_offset,
        })
    }

    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries_by_tag
            .get(&tag.as_u16())
            .map(|&idx| &self.entries[idx])
    }

    /// Inline scalar value of `tag`, if present.
    pub fn scalar(&self, tag: TiffTag, order: ByteOrder) -> Option<u64> {
        self.get_entry_by_tag(tag)?.inline_u64(order)
    }

    /// Whether the IFD stores its image as tiles.
    pub fn is_tiled(&self) -> bool {
        self.get_entry_by_tag(TiffTag::TileWidth).is_some()
            && self.get_entry_by_tag(TiffTag::TileLength).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
