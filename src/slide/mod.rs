//! Slide abstraction layer.
//!
//! The chunk store talks to slides only through the [`SlideDecoder`] trait:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              ChunkStore                 │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          SlideDecoder Trait             │
//! │  (geometry, region reads, properties)   │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TiffSlide                  │
//! │   (tiled TIFF / BigTIFF / Aperio SVS)   │
//! └─────────────────────────────────────────┘
//! ```

mod decoder;
mod tiff_slide;

#[cfg(test)]
pub(crate) mod testing;

pub use decoder::{
    level_property, DecoderOpener, SlideDecoder, PROPERTY_NAME_COMMENT,
    PROPERTY_NAME_IMAGE_DESCRIPTION, PROPERTY_NAME_LEVEL_COUNT, PROPERTY_NAME_VENDOR,
};
pub use tiff_slide::TiffSlide;

use std::path::Path;

use crate::error::SlideError;

/// Open the slide at `path` with the built-in TIFF decoder.
pub fn open_slide(path: &Path) -> Result<Box<dyn SlideDecoder>, SlideError> {
    TiffSlide::open_boxed(path)
}
