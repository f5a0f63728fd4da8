//! Tile decompression to RGBA.
//!
//! Every tile, whatever its storage, comes out as an `RgbaImage` of exactly
//! `tile_width x tile_height` pixels. Opaque pixels carry alpha 255.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, RgbaImage};

use crate::error::SlideError;

use super::jpeg::prepare_tile_jpeg;
use super::tiff::{Compression, PyramidLevel};

/// Decode one stored tile of `level`.
pub fn decode_tile(
    level: &PyramidLevel,
    jpeg_tables: Option<&[u8]>,
    raw: &[u8],
) -> Result<RgbaImage, SlideError> {
    let decoded = match level.compression {
        Compression::Jpeg => decode_jpeg(jpeg_tables, raw)?,
        Compression::None => decode_uncompressed(level, raw)?,
        other => {
            return Err(SlideError::Unsupported {
                reason: format!("{} compression", other.name()),
            })
        }
    };

    Ok(fit_to_tile(decoded, level.tile_width, level.tile_height))
}

/// Check up front that tiles of `level` are decodable.
pub fn check_level_supported(level: &PyramidLevel) -> Result<(), SlideError> {
    if !level.compression.is_supported() {
        return Err(SlideError::Unsupported {
            reason: format!(
                "level {} uses {} compression",
                level.level_index,
                level.compression.name()
            ),
        });
    }

    if level.compression == Compression::None {
        if level.bits_per_sample != 8 {
            return Err(SlideError::Unsupported {
                reason: format!("{} bits per sample", level.bits_per_sample),
            });
        }
        if level.planar_configuration != 1 {
            return Err(SlideError::Unsupported {
                reason: "planar sample layout".to_string(),
            });
        }
        if !matches!(level.samples_per_pixel, 1 | 3 | 4) {
            return Err(SlideError::Unsupported {
                reason: format!("{} samples per pixel", level.samples_per_pixel),
            });
        }
    }

    Ok(())
}

fn decode_jpeg(tables: Option<&[u8]>, raw: &[u8]) -> Result<RgbaImage, SlideError> {
    let stream = prepare_tile_jpeg(tables, raw);
    let image = ImageReader::with_format(Cursor::new(&stream[..]), ImageFormat::Jpeg)
        .decode()
        .map_err(|e| SlideError::Decode {
            message: e.to_string(),
        })?;
    Ok(image.to_rgba8())
}

fn decode_uncompressed(level: &PyramidLevel, raw: &[u8]) -> Result<RgbaImage, SlideError> {
    let (w, h) = (level.tile_width, level.tile_height);
    let samples = level.samples_per_pixel as usize;
    let pixels = w as usize * h as usize;

    if raw.len() < pixels * samples {
        return Err(SlideError::Decode {
            message: format!(
                "tile holds {} bytes, expected {}",
                raw.len(),
                pixels * samples
            ),
        });
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in raw.chunks_exact(samples).take(pixels) {
        match samples {
            1 => rgba.extend_from_slice(&[px[0], px[0], px[0], 255]),
            3 => rgba.extend_from_slice(&[px[0], px[1], px[2], 255]),
            _ => rgba.extend_from_slice(&px[..4]),
        }
    }

    RgbaImage::from_raw(w, h, rgba).ok_or_else(|| SlideError::Decode {
        message: "pixel buffer size mismatch".to_string(),
    })
}

/// Crop or zero-pad a decoded tile to the nominal tile size.
fn fit_to_tile(image: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.width() == width && image.height() == height {
        return image;
    }
    let mut out = RgbaImage::new(width, height);
    image::imageops::replace(&mut out, &image, 0, 0);
    out
}
