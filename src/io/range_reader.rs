use bytes::Bytes;

use crate::error::IoError;

/// Positional, read-only access to a byte resource.
///
/// Implementations must be safe to share between threads: the chunk store may
/// be driven by a parallel chunk-fetch layer.
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Identifier used in log lines and error messages.
    fn identifier(&self) -> &str;
}

/// In-memory resource, mostly useful for tests and small embedded fixtures.
impl RangeReader for Bytes {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= self.len() as u64 => {
                Ok(self.slice(offset as usize..end as usize))
            }
            _ => Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.len() as u64,
            }),
        }
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn identifier(&self) -> &str {
        "memory"
    }
}
