//! TIFF pyramid level identification.
//!
//! Every tiled IFD is a resolution level; stripped IFDs (labels, macro
//! images, Aperio thumbnails) are skipped. Levels are sorted by area so that
//! level 0 is the full-resolution image, and each level's downsample is the
//! mean of its width and height ratios to level 0.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::tags::{Compression, TiffTag};
use super::values::ValueReader;

/// Maximum number of IFDs to follow (guards against offset cycles)
const MAX_IFDS: usize = 256;

// =============================================================================
// PyramidLevel
// =============================================================================

/// One resolution level of the pyramid.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// 0 = highest resolution
    pub level_index: usize,

    /// Position of the source IFD in the file's chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,

    /// Relative to level 0 (1.0 for level 0)
    pub downsample: f64,

    pub compression: Compression,
    pub samples_per_pixel: u16,
    pub bits_per_sample: u16,

    /// 1 = chunky, 2 = planar
    pub planar_configuration: u16,

    tile_offsets: IfdEntry,
    tile_byte_counts: IfdEntry,
    jpeg_tables: Option<IfdEntry>,
}

impl PyramidLevel {
    /// Build a level from a tiled IFD; `None` if the IFD is not tiled or
    /// lacks tile data.
    fn from_ifd(ifd: &Ifd, ifd_index: usize, header: &TiffHeader) -> Option<Self> {
        let order = header.byte_order;
        let tile_width = ifd.scalar(TiffTag::TileWidth, order)? as u32;
        let tile_height = ifd.scalar(TiffTag::TileLength, order)? as u32;
        let width = ifd.scalar(TiffTag::ImageWidth, order)? as u32;
        let height = ifd.scalar(TiffTag::ImageLength, order)? as u32;

        if tile_width == 0 || tile_height == 0 || width == 0 || height == 0 {
            return None;
        }

        let tiles_x = width.div_ceil(tile_width);
        let tiles_y = height.div_ceil(tile_height);

        let compression = ifd
            .scalar(TiffTag::Compression, order)
            .map(|c| Compression::from_u16(c as u16))
            .unwrap_or(Compression::None);

        // One value per sample; RGB stores them out of line, where 8 is assumed.
        let bits_per_sample = ifd
            .get_entry_by_tag(TiffTag::BitsPerSample)
            .map(|e| {
                if e.is_inline {
                    order.read_u16(&e.value_offset_bytes)
                } else {
                    8
                }
            })
            .unwrap_or(1);

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            downsample: 1.0,
            compression,
            samples_per_pixel: ifd.scalar(TiffTag::SamplesPerPixel, order).unwrap_or(1) as u16,
            bits_per_sample,
            planar_configuration: ifd.scalar(TiffTag::PlanarConfiguration, order).unwrap_or(1)
                as u16,
            tile_offsets: ifd.get_entry_by_tag(TiffTag::TileOffsets)?.clone(),
            tile_byte_counts: ifd.get_entry_by_tag(TiffTag::TileByteCounts)?.clone(),
            jpeg_tables: ifd.get_entry_by_tag(TiffTag::JpegTables).cloned(),
        })
    }

    /// Row-major tile index, `None` when out of range.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<usize> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y as usize * self.tiles_x as usize + tile_x as usize)
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// A parsed TIFF image pyramid.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,

    /// Sorted by resolution, 0 = highest
    pub levels: Vec<PyramidLevel>,

    /// ImageDescription of the first IFD, if any
    pub description: Option<String>,

    /// Whether the first IFD in the file is tiled
    pub first_ifd_tiled: bool,

    /// Total number of IFDs in the chain
    pub ifd_count: usize,
}

impl TiffPyramid {
    /// Parse the file header and IFD chain, then identify pyramid levels.
    pub fn parse<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, TiffError> {
        let size = reader.size();
        if size < TIFF_HEADER_SIZE as u64 {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: size,
            });
        }
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(size) as usize;
        let header_bytes = reader.read_exact_at(0, header_len)?;
        let header = TiffHeader::parse(&header_bytes, size)?;

        let ifds = Self::parse_all_ifds(reader, &header)?;

        let description = match ifds.first() {
            Some(first) => match first.get_entry_by_tag(TiffTag::ImageDescription) {
                Some(entry) => Some(ValueReader::new(reader, &header).read_string(entry)?),
                None => None,
            },
            None => None,
        };

        let first_ifd_tiled = ifds.first().is_some_and(Ifd::is_tiled);
        let ifd_count = ifds.len();

        let mut levels: Vec<PyramidLevel> = ifds
            .iter()
            .enumerate()
            .filter_map(|(idx, ifd)| PyramidLevel::from_ifd(ifd, idx, &header))
            .collect();

        // Largest first; a stable sort keeps file order between equal areas
        levels.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));
        levels.dedup_by(|b, a| a.width == b.width && a.height == b.height);

        if let Some(base) = levels.first() {
            let (base_w, base_h) = (base.width as f64, base.height as f64);
            for (idx, level) in levels.iter_mut().enumerate() {
                level.level_index = idx;
                level.downsample =
                    (base_w / level.width as f64 + base_h / level.height as f64) / 2.0;
            }
        }

        Ok(TiffPyramid {
            header,
            levels,
            description,
            first_ifd_tiled,
            ifd_count,
        })
    }

    fn parse_all_ifds<R: RangeReader + ?Sized>(
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            let count_bytes = reader.read_exact_at(offset, header.ifd_count_size())?;
            let entry_count = if header.is_bigtiff {
                header.byte_order.read_u64(&count_bytes)
            } else {
                header.byte_order.read_u16(&count_bytes) as u64
            };

            let ifd_size = Ifd::calculate_size(entry_count, header)?;
            if offset.saturating_add(ifd_size as u64) > reader.size() {
                return Err(TiffError::InvalidEntryCount(entry_count));
            }
            let ifd_bytes = reader.read_exact_at(offset, ifd_size)?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn get_level(&self, level: usize) -> Option<&PyramidLevel> {
        self.levels.get(level)
    }
}

// =============================================================================
// Tile Data Loading
// =============================================================================

/// Tile locations for one pyramid level.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    pub fn load<R: RangeReader + ?Sized>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets = values.read_u64_array(&level.tile_offsets)?;
        let byte_counts = values.read_u64_array(&level.tile_byte_counts)?;

        let expected = level.tiles_x as usize * level.tiles_y as usize;
        if offsets.len() < expected || byte_counts.len() < expected {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::TileOffsets.name(),
                message: format!(
                    "level {} needs {} tiles, found {} offsets and {} byte counts",
                    level.level_index,
                    expected,
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match &level.jpeg_tables {
            Some(entry) => Some(values.read_bytes(entry)?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// Offset and size of a tile.
    pub fn get_tile_location(&self, tile_index: usize) -> Option<(u64, u64)> {
        Some((
            *self.offsets.get(tile_index)?,
            *self.byte_counts.get(tile_index)?,
        ))
    }
}
