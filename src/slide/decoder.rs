//! SlideDecoder trait for format-agnostic pyramid access.
//!
//! A decoder is an open handle on one multi-resolution image. Level 0 is the
//! full resolution; each following level is smaller by its downsample factor.
//! Region reads are addressed in level-0 coordinates and return RGBA pixels.

use std::collections::BTreeMap;

use image::RgbaImage;

use crate::error::SlideError;

// =============================================================================
// Property Names
// =============================================================================

/// Free-text comment of the slide (the first image description for TIFFs)
pub const PROPERTY_NAME_COMMENT: &str = "openslide.comment";

/// Detected vendor of the slide
pub const PROPERTY_NAME_VENDOR: &str = "openslide.vendor";

/// Number of pyramid levels
pub const PROPERTY_NAME_LEVEL_COUNT: &str = "openslide.level-count";

/// Raw TIFF ImageDescription of the first directory
pub const PROPERTY_NAME_IMAGE_DESCRIPTION: &str = "tiff.ImageDescription";

/// Name of a per-level property, e.g. `openslide.level[1].downsample`.
pub fn level_property(level: usize, field: &str) -> String {
    format!("openslide.level[{}].{}", level, field)
}

// =============================================================================
// SlideDecoder Trait
// =============================================================================

/// An open pyramidal slide.
///
/// Every method may fail once the handle is closed; after [`close`] the only
/// valid call is another `close`, which does nothing.
///
/// [`close`]: SlideDecoder::close
pub trait SlideDecoder: Send {
    /// Number of resolution levels, at least 1 for an open slide.
    fn level_count(&self) -> Result<usize, SlideError>;

    /// `(width, height)` of every level, level 0 first.
    fn level_dimensions(&self) -> Result<Vec<(u64, u64)>, SlideError>;

    /// Downsample factor of every level relative to level 0 (level 0 is 1.0).
    fn level_downsamples(&self) -> Result<Vec<f64>, SlideError>;

    /// Read a `width x height` RGBA region of `level`.
    ///
    /// `(x, y)` is the top-left corner in level-0 pixel coordinates. Pixels
    /// outside the level's extent come back as zero (transparent black).
    ///
    /// # Errors
    ///
    /// Returns an error if the level is out of range, the handle is closed,
    /// or a tile cannot be read or decompressed.
    fn read_region(
        &self,
        x: u64,
        y: u64,
        level: usize,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, SlideError>;

    /// Free-form string properties of the slide.
    fn properties(&self) -> &BTreeMap<String, String>;

    /// Release the underlying resource. Idempotent.
    fn close(&mut self);
}

/// Opens a decoder for a local path; the seam used by the format gate.
pub type DecoderOpener =
    fn(&std::path::Path) -> Result<Box<dyn SlideDecoder>, SlideError>;
