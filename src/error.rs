use std::fmt;

use thiserror::Error;

/// I/O errors that can occur when reading from a slide file
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Underlying read or open failure
    #[error("I/O error on {path}: {message}")]
    Read { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// File exists but cannot be opened
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl IoError {
    /// Classify a `std::io::Error` raised while accessing `path`.
    pub fn from_std(path: impl Into<String>, err: &std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(path),
            std::io::ErrorKind::PermissionDenied => IoError::PermissionDenied(path),
            _ => IoError::Read {
                path,
                message: err.to_string(),
            },
        }
    }
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// IFD entry count does not fit in the file
    #[error("Invalid IFD entry count: {0}")]
    InvalidEntryCount(u64),
}

/// Errors raised by a slide decoder.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// The file is readable but not a slide this decoder understands
    #[error("Unsupported slide: {reason}")]
    Unsupported { reason: String },

    #[error("Level {level} out of range (slide has {level_count} levels)")]
    LevelOutOfRange { level: usize, level_count: usize },

    /// Tile payload could not be decompressed
    #[error("Tile decode failed: {message}")]
    Decode { message: String },

    /// The handle was closed before the call
    #[error("Slide handle is closed")]
    Closed,
}

impl SlideError {
    /// Whether this error means "not a slide we can read" rather than an
    /// environment failure.
    pub fn is_unsupported(&self) -> bool {
        match self {
            SlideError::Unsupported { .. } | SlideError::Tiff(_) | SlideError::Decode { .. } => {
                true
            }
            SlideError::Io(IoError::RangeOutOfBounds { .. }) => true,
            _ => false,
        }
    }
}

/// Why a key could not be served. Only used for diagnostics; callers see a
/// single [`StoreError::NotFound`] regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// Key is neither metadata nor `<level>/<row>.<col>.<chan>`
    Malformed,
    /// Level index is past the last pyramid level
    LevelOutOfRange,
    /// Row or column lies outside the level's chunk grid
    ChunkOutOfGrid,
    /// The decoder failed while reading the region
    Decode,
    /// The store has been closed
    Closed,
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotFoundReason::Malformed => "malformed key",
            NotFoundReason::LevelOutOfRange => "level out of range",
            NotFoundReason::ChunkOutOfGrid => "chunk outside grid",
            NotFoundReason::Decode => "decode failure",
            NotFoundReason::Closed => "store closed",
        };
        f.write_str(s)
    }
}

/// Errors returned by the chunk store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Uniform "missing key" signal for every lookup failure
    #[error("Key not found: {key} ({reason})")]
    NotFound { key: String, reason: NotFoundReason },

    /// Geometry query failed while building metadata
    #[error("Failed to construct store: {0}")]
    Construction(#[from] SlideError),

    #[error("Tile size must be greater than 0")]
    InvalidTileSize,

    /// A metadata document could not be encoded
    #[error("Failed to encode metadata {key}: {message}")]
    Metadata { key: String, message: String },

    /// The configured compressor rejected a chunk
    #[error("Failed to compress chunk {key}: {message}")]
    Compression { key: String, message: String },
}

impl StoreError {
    pub fn not_found(key: impl Into<String>, reason: NotFoundReason) -> Self {
        StoreError::NotFound {
            key: key.into(),
            reason,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Host-environment failures during format detection.
///
/// Format mismatches never surface here; they are a `None` answer.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    #[error("I/O error during detection: {0}")]
    Io(#[from] IoError),
}

/// Errors from lazy array access.
#[derive(Debug, Clone, Error)]
pub enum ArrayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Metadata document could not be parsed
    #[error("Invalid metadata at {path}: {message}")]
    Metadata { path: String, message: String },

    #[error("Chunk ({row}, {col}) outside grid {rows}x{cols}")]
    ChunkOutOfBounds {
        row: u64,
        col: u64,
        rows: u64,
        cols: u64,
    },

    /// Stored chunk does not hold a whole chunk of pixels
    #[error("Chunk {key} holds {actual} bytes, expected {expected}")]
    ChunkSize {
        key: String,
        actual: usize,
        expected: usize,
    },

    #[error("Region {y}+{height}, {x}+{width} exceeds array bounds {shape:?}")]
    RegionOutOfBounds {
        y: u64,
        x: u64,
        height: u64,
        width: u64,
        shape: Vec<u64>,
    },
}

/// Errors from the reader entry point.
#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Array(#[from] ArrayError),

    /// Root attributes carry no multiscales entry
    #[error("No multiscales found in root attributes")]
    NoMultiscales,
}

/// Errors from the HTTP front's store registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Identifier would escape the slide directory or has a bad suffix
    #[error("Invalid slide id: {0}")]
    InvalidSlideId(String),

    /// No readable pyramidal slide under this identifier
    #[error("Slide not found: {0}")]
    SlideNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl From<GateError> for RegistryError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Io(io) => RegistryError::Io(io),
        }
    }
}
