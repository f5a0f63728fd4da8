//! Pyramidal TIFF decoder.
//!
//! Handles tiled classic TIFF and BigTIFF pyramids, including Aperio SVS,
//! whose levels are JPEG or uncompressed 8-bit tiles. Regions are stitched
//! from every tile they overlap.

use std::collections::BTreeMap;
use std::path::Path;

use image::RgbaImage;
use tracing::debug;

use crate::error::{IoError, SlideError};
use crate::format::codec::{check_level_supported, decode_tile};
use crate::format::tiff::{PyramidLevel, TiffPyramid, TileData};
use crate::io::{FileRangeReader, RangeReader};

use super::decoder::{
    level_property, SlideDecoder, PROPERTY_NAME_COMMENT, PROPERTY_NAME_IMAGE_DESCRIPTION,
    PROPERTY_NAME_LEVEL_COUNT, PROPERTY_NAME_VENDOR,
};

/// Marker Aperio writes at the start of its ImageDescription
const APERIO_MARKER: &str = "Aperio";

// =============================================================================
// TiffSlide
// =============================================================================

/// A tiled TIFF pyramid opened for region reads.
pub struct TiffSlide<R: RangeReader = FileRangeReader> {
    /// `None` once closed
    reader: Option<R>,

    pyramid: TiffPyramid,

    /// Tile locations, parallel to `pyramid.levels`
    tiles: Vec<TileData>,

    properties: BTreeMap<String, String>,
}

impl TiffSlide<FileRangeReader> {
    /// Open a local TIFF file.
    ///
    /// # Errors
    ///
    /// I/O failures come back as [`SlideError::Io`]; files that are not
    /// tiled pyramids this decoder can read come back as
    /// [`SlideError::Unsupported`] or [`SlideError::Tiff`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SlideError> {
        let reader = FileRangeReader::open(path)?;
        Self::from_reader(reader)
    }

    /// Open as a boxed trait object.
    pub fn open_boxed(path: &Path) -> Result<Box<dyn SlideDecoder>, SlideError> {
        Ok(Box::new(Self::open(path)?))
    }
}

impl<R: RangeReader> TiffSlide<R> {
    /// Parse the pyramid structure behind `reader`.
    pub fn from_reader(reader: R) -> Result<Self, SlideError> {
        let pyramid = TiffPyramid::parse(&reader)?;

        if !pyramid.first_ifd_tiled {
            return Err(SlideError::Unsupported {
                reason: "first image directory is not tiled".to_string(),
            });
        }
        if pyramid.levels.is_empty() {
            return Err(SlideError::Unsupported {
                reason: "no tiled pyramid levels".to_string(),
            });
        }

        let mut tiles = Vec::with_capacity(pyramid.level_count());
        for level in &pyramid.levels {
            check_level_supported(level)?;
            tiles.push(TileData::load(&reader, level, &pyramid.header)?);
        }

        let properties = build_properties(&pyramid);

        debug!(
            slide = reader.identifier(),
            levels = pyramid.level_count(),
            ifds = pyramid.ifd_count,
            "opened TIFF slide"
        );

        Ok(Self {
            reader: Some(reader),
            pyramid,
            tiles,
            properties,
        })
    }

    fn reader(&self) -> Result<&R, SlideError> {
        self.reader.as_ref().ok_or(SlideError::Closed)
    }

    fn level(&self, level: usize) -> Result<&PyramidLevel, SlideError> {
        self.pyramid
            .get_level(level)
            .ok_or(SlideError::LevelOutOfRange {
                level,
                level_count: self.pyramid.level_count(),
            })
    }

    /// Decode one tile of a level, or `None` for a sparse (empty) tile.
    fn read_tile(
        &self,
        reader: &R,
        level: &PyramidLevel,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Option<RgbaImage>, SlideError> {
        let data = &self.tiles[level.level_index];
        let location = level
            .tile_index(tile_x, tile_y)
            .and_then(|idx| data.get_tile_location(idx));

        let (offset, size) = match location {
            Some((_, 0)) | None => return Ok(None),
            Some(loc) => loc,
        };

        let len = usize::try_from(size).map_err(|_| IoError::RangeOutOfBounds {
            offset,
            requested: size,
            size: reader.size(),
        })?;
        let raw = reader.read_exact_at(offset, len)?;
        let tile = decode_tile(level, data.jpeg_tables.as_deref(), &raw)?;
        Ok(Some(tile))
    }
}

fn build_properties(pyramid: &TiffPyramid) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();

    let vendor = match &pyramid.description {
        Some(desc) if desc.starts_with(APERIO_MARKER) => "aperio",
        _ => "generic-tiff",
    };
    props.insert(PROPERTY_NAME_VENDOR.to_string(), vendor.to_string());

    if let Some(desc) = &pyramid.description {
        props.insert(PROPERTY_NAME_COMMENT.to_string(), desc.clone());
        props.insert(PROPERTY_NAME_IMAGE_DESCRIPTION.to_string(), desc.clone());
    }

    props.insert(
        PROPERTY_NAME_LEVEL_COUNT.to_string(),
        pyramid.level_count().to_string(),
    );
    for level in &pyramid.levels {
        let i = level.level_index;
        props.insert(level_property(i, "width"), level.width.to_string());
        props.insert(level_property(i, "height"), level.height.to_string());
        props.insert(level_property(i, "downsample"), level.downsample.to_string());
        props.insert(level_property(i, "tile-width"), level.tile_width.to_string());
        props.insert(level_property(i, "tile-height"), level.tile_height.to_string());
    }

    props
}

/// Copy the part of `tile` (placed at `tile_origin` in level space) that
/// falls inside the output window starting at `window_origin`, clipped to
/// `limit` (the level extent).
fn blit(
    out: &mut RgbaImage,
    window_origin: (u64, u64),
    tile: &RgbaImage,
    tile_origin: (u64, u64),
    limit: (u64, u64),
) {
    let (wx, wy) = window_origin;
    let (tx, ty) = tile_origin;

    let x0 = wx.max(tx);
    let y0 = wy.max(ty);
    let x1 = (wx + out.width() as u64)
        .min(tx + tile.width() as u64)
        .min(limit.0);
    let y1 = (wy + out.height() as u64)
        .min(ty + tile.height() as u64)
        .min(limit.1);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let row_bytes = (x1 - x0) as usize * 4;
    let out_stride = out.width() as usize * 4;
    let tile_stride = tile.width() as usize * 4;
    let src: &[u8] = tile;
    let dst: &mut [u8] = out;

    for y in y0..y1 {
        let s = (y - ty) as usize * tile_stride + (x0 - tx) as usize * 4;
        let d = (y - wy) as usize * out_stride + (x0 - wx) as usize * 4;
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
}

// =============================================================================
// SlideDecoder Implementation
// =============================================================================

impl<R: RangeReader> SlideDecoder for TiffSlide<R> {
    fn level_count(&self) -> Result<usize, SlideError> {
        self.reader()?;
        Ok(self.pyramid.level_count())
    }

    fn level_dimensions(&self) -> Result<Vec<(u64, u64)>, SlideError> {
        self.reader()?;
        Ok(self
            .pyramid
            .levels
            .iter()
            .map(|l| (l.width as u64, l.height as u64))
            .collect())
    }

    fn level_downsamples(&self) -> Result<Vec<f64>, SlideError> {
        self.reader()?;
        Ok(self.pyramid.levels.iter().map(|l| l.downsample).collect())
    }

    fn read_region(
        &self,
        x: u64,
        y: u64,
        level: usize,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, SlideError> {
        let reader = self.reader()?;
        let lvl = self.level(level)?;

        let mut out = RgbaImage::new(width, height);
        if width == 0 || height == 0 {
            return Ok(out);
        }

        // Level-space window
        let lx = (x as f64 / lvl.downsample).floor() as u64;
        let ly = (y as f64 / lvl.downsample).floor() as u64;
        let (level_w, level_h) = (lvl.width as u64, lvl.height as u64);
        if lx >= level_w || ly >= level_h {
            return Ok(out);
        }

        let (tw, th) = (lvl.tile_width as u64, lvl.tile_height as u64);
        let last_x = (lx + width as u64).min(level_w) - 1;
        let last_y = (ly + height as u64).min(level_h) - 1;

        for tile_y in (ly / th)..=(last_y / th) {
            for tile_x in (lx / tw)..=(last_x / tw) {
                let tile = match self.read_tile(reader, lvl, tile_x as u32, tile_y as u32)? {
                    Some(tile) => tile,
                    None => continue,
                };
                blit(
                    &mut out,
                    (lx, ly),
                    &tile,
                    (tile_x * tw, tile_y * th),
                    (level_w, level_h),
                );
            }
        }

        Ok(out)
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            debug!(slide = reader.identifier(), "closed TIFF slide");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
