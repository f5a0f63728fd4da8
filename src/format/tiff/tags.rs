//! TIFF tag and field type definitions.
//!
//! Only the vocabulary needed to locate pyramid tiles and decode them is
//! modelled here. Unknown tags and field types are carried through parsing
//! untouched and simply never looked up.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,

    /// 8-bit ASCII character, NUL terminated
    Ascii = 2,

    /// Unsigned 16-bit integer
    Short = 3,

    /// Unsigned 32-bit integer
    Long = 4,

    /// Two Longs: numerator and denominator
    Rational = 5,

    /// Opaque bytes
    Undefined = 7,

    /// Unsigned 64-bit integer (BigTIFF only)
    Long8 = 16,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs used to build the slide pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,

    /// Free-form description; vendors put their metadata here
    ImageDescription = 270,

    SamplesPerPixel = 277,
    PlanarConfiguration = 284,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,

    /// Shared quantization/Huffman tables for abbreviated JPEG tiles
    JpegTables = 347,
}

impl TiffTag {
    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Human readable tag name, used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::PlanarConfiguration => "PlanarConfiguration",
            TiffTag::TileWidth => "TileWidth",
            TiffTag::TileLength => "TileLength",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
            TiffTag::JpegTables => "JPEGTables",
        }
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzw,
    Jpeg,
    Deflate,
    /// Aperio JPEG 2000 (YCbCr or RGB)
    Jpeg2000,
    Other(u16),
}

impl Compression {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Compression::None,
            5 => Compression::Lzw,
            7 => Compression::Jpeg,
            8 | 32946 => Compression::Deflate,
            33003 | 33005 => Compression::Jpeg2000,
            other => Compression::Other(other),
        }
    }

    /// Whether tiles with this compression can be decoded.
    pub const fn is_supported(self) -> bool {
        matches!(self, Compression::None | Compression::Jpeg)
    }

    pub fn name(self) -> String {
        match self {
            Compression::None => "None".to_string(),
            Compression::Lzw => "LZW".to_string(),
            Compression::Jpeg => "JPEG".to_string(),
            Compression::Deflate => "Deflate".to_string(),
            Compression::Jpeg2000 => "JPEG 2000".to_string(),
            Compression::Other(v) => format!("Unknown({})", v),
        }
    }
}
