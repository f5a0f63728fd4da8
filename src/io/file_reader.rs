use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;

use crate::error::IoError;

use super::RangeReader;

/// [`RangeReader`] over a local file.
///
/// Seeks and reads happen under one mutex so a single descriptor can serve
/// concurrent callers.
#[derive(Debug)]
pub struct FileRangeReader {
    file: Mutex<File>,
    size: u64,
    path: PathBuf,
    identifier: String,
}

impl FileRangeReader {
    /// Open `path` for positional reads.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let file = File::open(path).map_err(|e| IoError::from_std(display.clone(), &e))?;
        let metadata = file
            .metadata()
            .map_err(|e| IoError::from_std(display.clone(), &e))?;

        if metadata.is_dir() {
            return Err(IoError::Read {
                path: display,
                message: "is a directory".to_string(),
            });
        }

        Ok(Self {
            file: Mutex::new(file),
            size: metadata.len(),
            path: path.to_path_buf(),
            identifier: display,
        })
    }

    /// Path the reader was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RangeReader for FileRangeReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let in_bounds = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.size);
        if !in_bounds {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().map_err(|_| IoError::Read {
            path: self.identifier.clone(),
            message: "file lock poisoned".to_string(),
        })?;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| IoError::from_std(self.identifier.clone(), &e))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
