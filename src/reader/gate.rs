//! Format gate: decides whether a source is a slide this crate should read.
//!
//! Rejection is never an error. A source that is a list, has the wrong
//! suffix, cannot be opened as a supported slide, is an OME-TIFF, or has a
//! single resolution level gets `Ok(None)` so the host can try other readers.
//! Only environment failures such as permission errors come back as `Err`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{GateError, IoError, ReaderError, SlideError, TiffError};
use crate::slide::{open_slide, DecoderOpener, SlideDecoder, PROPERTY_NAME_COMMENT};

use super::pyramid::{read, LayerData};

/// File suffixes the gate considers, matched case-sensitively
pub const ACCEPTED_SUFFIXES: [&str; 2] = [".tif", ".tiff"];

/// Trailer of an OME-XML image description
pub const OME_TERMINATOR: &str = "OME>";

/// Entry point handed back for accepted sources.
pub type ReaderFn = fn(&Path) -> Result<Vec<LayerData>, ReaderError>;

/// What the host offers for reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    /// Several paths at once; never accepted
    Many(Vec<PathBuf>),
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<Vec<PathBuf>> for Source {
    fn from(paths: Vec<PathBuf>) -> Self {
        Source::Many(paths)
    }
}

/// Return the reader entry point if `source` is a readable pyramidal slide.
///
/// # Errors
///
/// Returns [`GateError::Io`] when the environment stops the file from being
/// read, such as a missing file or denied permission.
pub fn detect(source: &Source) -> Result<Option<ReaderFn>, GateError> {
    detect_with(source, open_slide)
}

/// [`detect`] with a custom decoder opener.
pub fn detect_with(source: &Source, opener: DecoderOpener) -> Result<Option<ReaderFn>, GateError> {
    let path = match source {
        Source::Many(_) => return Ok(None),
        Source::Path(path) => path,
    };

    if !has_accepted_suffix(path) {
        return Ok(None);
    }
    if path.is_dir() {
        return Ok(None);
    }

    let mut probe = match opener(path) {
        Ok(decoder) => decoder,
        Err(err) => {
            if let Some(io) = environment_failure(&err) {
                return Err(GateError::Io(io));
            }
            debug!(path = %path.display(), error = %err, "not a supported slide");
            return Ok(None);
        }
    };

    let accepted = is_pyramidal_slide(probe.as_ref(), path);
    probe.close();

    Ok(accepted.then_some(read as ReaderFn))
}

/// Whether `path` ends with one of [`ACCEPTED_SUFFIXES`].
pub fn has_accepted_suffix(path: &Path) -> bool {
    let name = path.to_string_lossy();
    ACCEPTED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn is_pyramidal_slide(probe: &dyn SlideDecoder, path: &Path) -> bool {
    let is_ome = probe
        .properties()
        .get(PROPERTY_NAME_COMMENT)
        .is_some_and(|comment| comment.ends_with(OME_TERMINATOR));
    if is_ome {
        debug!(path = %path.display(), "OME-TIFF left to other readers");
        return false;
    }

    match probe.level_count() {
        Ok(1) => {
            debug!(path = %path.display(), "single-level image is not a pyramid");
            false
        }
        Ok(_) => true,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "level count unavailable");
            false
        }
    }
}

/// The I/O error behind `err` if it is an environment failure rather than
/// a property of the file's contents.
fn environment_failure(err: &SlideError) -> Option<IoError> {
    let io = match err {
        SlideError::Io(io) | SlideError::Tiff(TiffError::Io(io)) => io,
        _ => return None,
    };
    match io {
        // Offsets past the end of the file mean a malformed file
        IoError::RangeOutOfBounds { .. } => None,
        other => Some(other.clone()),
    }
}
