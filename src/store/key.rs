//! Store key namespace.
//!
//! ```text
//! .zgroup                   group descriptor
//! .zattrs                   root attributes (multiscales)
//! <level>/.zarray           array descriptor per level
//! <level>/<row>.<col>.0     RGBA chunk
//! ```

use std::fmt;

/// Key of the group descriptor
pub const GROUP_META_KEY: &str = ".zgroup";

/// Key of the root attributes
pub const ATTRS_KEY: &str = ".zattrs";

/// File name of an array descriptor inside its level directory
pub const ARRAY_META_KEY: &str = ".zarray";

/// Key of the array descriptor for `level`.
pub fn array_meta_key(level: usize) -> String {
    format!("{}/{}", level, ARRAY_META_KEY)
}

/// Address of one chunk: a tile of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub level: usize,
    pub row: u64,
    pub col: u64,
}

impl ChunkKey {
    pub fn new(level: usize, row: u64, col: u64) -> Self {
        Self { level, row, col }
    }

    /// Parse `"<level>/<row>.<col>.<chan>"`.
    ///
    /// Every component must be a plain decimal number. The channel is
    /// required but ignored, since each chunk carries all four channels.
    pub fn parse(key: &str) -> Option<Self> {
        let (level, rest) = key.split_once('/')?;
        let mut parts = rest.split('.');
        let row = parts.next()?;
        let col = parts.next()?;
        let chan = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let level = parse_decimal(level)?;
        let row = parse_decimal(row)?;
        let col = parse_decimal(col)?;
        parse_decimal(chan)?;

        Some(Self {
            level: usize::try_from(level).ok()?,
            row,
            col,
        })
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}.0", self.level, self.row, self.col)
    }
}

fn parse_decimal(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
