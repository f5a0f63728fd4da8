//! Test fixtures: an in-memory pyramid TIFF writer and a mock decoder.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use crate::error::SlideError;

use super::decoder::SlideDecoder;

// =============================================================================
// Pyramid TIFF Writer
// =============================================================================

/// Pixel value written at `(x, y)` of `level`.
pub fn pattern(level: usize, x: u32, y: u32) -> [u8; 3] {
    [(x % 251) as u8, (y % 241) as u8, 10 + level as u8 * 40]
}

/// Shape of a test pyramid.
pub struct PyramidSpec {
    pub levels: Vec<(u32, u32)>,
    pub tile: u32,
    pub description: Option<String>,
    pub compression: u16,
}

impl PyramidSpec {
    pub fn new(levels: &[(u32, u32)], tile: u32) -> Self {
        Self {
            levels: levels.to_vec(),
            tile,
            description: None,
            compression: 1,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = compression;
        self
    }
}

/// Write a little-endian tiled TIFF with one uncompressed RGB IFD per level.
pub fn build_rgb_pyramid(spec: &PyramidSpec) -> Vec<u8> {
    let tile = spec.tile;
    let mut data = vec![0x49, 0x49, 0x2A, 0x00, 0, 0, 0, 0];
    let mut locations = Vec::new();

    for (l, &(w, h)) in spec.levels.iter().enumerate() {
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for ty in 0..h.div_ceil(tile) {
            for tx in 0..w.div_ceil(tile) {
                offsets.push(data.len() as u32);
                for row in 0..tile {
                    for col in 0..tile {
                        let (px, py) = (tx * tile + col, ty * tile + row);
                        if px < w && py < h {
                            data.extend_from_slice(&pattern(l, px, py));
                        } else {
                            data.extend_from_slice(&[0, 0, 0]);
                        }
                    }
                }
                counts.push(tile * tile * 3);
            }
        }
        locations.push((offsets, counts));
    }

    let mut arrays = Vec::new();
    for (offsets, counts) in &locations {
        let offsets_pos = data.len() as u32;
        offsets.iter().for_each(|o| data.extend_from_slice(&o.to_le_bytes()));
        let counts_pos = data.len() as u32;
        counts.iter().for_each(|c| data.extend_from_slice(&c.to_le_bytes()));
        arrays.push((offsets_pos, counts_pos));
    }

    let description = spec.description.as_ref().map(|d| {
        let mut bytes = d.as_bytes().to_vec();
        bytes.push(0);
        let pos = data.len() as u32;
        data.extend_from_slice(&bytes);
        (bytes, pos)
    });

    if data.len() % 2 == 1 {
        data.push(0);
    }
    let first_ifd = data.len() as u32;
    data[4..8].copy_from_slice(&first_ifd.to_le_bytes());

    for (l, &(w, h)) in spec.levels.iter().enumerate() {
        let (offsets, counts) = &locations[l];
        let (offsets_pos, counts_pos) = arrays[l];
        let n = offsets.len() as u32;
        let inline_or = |single: u32, pos: u32| if n == 1 { single } else { pos };

        let mut entries: Vec<(u16, u16, u32, [u8; 4])> = vec![
            (256, 4, 1, w.to_le_bytes()),
            (257, 4, 1, h.to_le_bytes()),
            (258, 3, 1, short(8)),
            (259, 3, 1, short(spec.compression)),
            (262, 3, 1, short(2)),
        ];
        if l == 0 {
            if let Some((bytes, pos)) = &description {
                let slot = if bytes.len() <= 4 {
                    let mut slot = [0u8; 4];
                    slot[..bytes.len()].copy_from_slice(bytes);
                    slot
                } else {
                    pos.to_le_bytes()
                };
                entries.push((270, 2, bytes.len() as u32, slot));
            }
        }
        entries.extend([
            (277, 3, 1, short(3)),
            (284, 3, 1, short(1)),
            (322, 3, 1, short(tile as u16)),
            (323, 3, 1, short(tile as u16)),
            (324, 4, n, inline_or(offsets[0], offsets_pos).to_le_bytes()),
            (325, 4, n, inline_or(counts[0], counts_pos).to_le_bytes()),
        ]);

        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (tag, field_type, count, slot) in entries {
            data.extend_from_slice(&tag.to_le_bytes());
            data.extend_from_slice(&field_type.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
            data.extend_from_slice(&slot);
        }
        let next = if l + 1 == spec.levels.len() {
            0
        } else {
            data.len() as u32 + 4
        };
        data.extend_from_slice(&next.to_le_bytes());
    }

    data
}

fn short(value: u16) -> [u8; 4] {
    let b = value.to_le_bytes();
    [b[0], b[1], 0, 0]
}

// =============================================================================
// Mock Decoder
// =============================================================================

/// One recorded `read_region` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRead {
    pub x: u64,
    pub y: u64,
    pub level: usize,
    pub width: u32,
    pub height: u32,
}

/// A decoder with scripted geometry that records every region read.
///
/// Region pixels are `[level + 1, x % 256, y % 256, 255]` where `(x, y)` is
/// the requested origin, so tests can tell reads apart.
pub struct MockDecoder {
    pub dimensions: Vec<(u64, u64)>,
    pub downsamples: Vec<f64>,
    pub properties: BTreeMap<String, String>,
    pub reads: Arc<Mutex<Vec<RegionRead>>>,
    pub closed: Arc<AtomicBool>,
    pub fail_reads: bool,
    pub fail_geometry: bool,

    /// Reported level count when it should disagree with `dimensions`
    pub level_count: Option<usize>,
}

impl MockDecoder {
    pub fn new(dimensions: &[(u64, u64)], downsamples: &[f64]) -> Self {
        Self {
            dimensions: dimensions.to_vec(),
            downsamples: downsamples.to_vec(),
            properties: BTreeMap::new(),
            reads: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            fail_reads: false,
            fail_geometry: false,
            level_count: None,
        }
    }

    /// Two levels: 1000x800 and 500x400.
    pub fn two_level() -> Self {
        Self::new(&[(1000, 800), (500, 400)], &[1.0, 2.0])
    }

    fn check_open(&self) -> Result<(), SlideError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SlideError::Closed)
        } else {
            Ok(())
        }
    }

    fn geometry_failure(&self) -> Result<(), SlideError> {
        if self.fail_geometry {
            return Err(SlideError::Decode {
                message: "scripted geometry failure".to_string(),
            });
        }
        Ok(())
    }
}

impl SlideDecoder for MockDecoder {
    fn level_count(&self) -> Result<usize, SlideError> {
        self.check_open()?;
        self.geometry_failure()?;
        Ok(self.level_count.unwrap_or(self.dimensions.len()))
    }

    fn level_dimensions(&self) -> Result<Vec<(u64, u64)>, SlideError> {
        self.check_open()?;
        self.geometry_failure()?;
        Ok(self.dimensions.clone())
    }

    fn level_downsamples(&self) -> Result<Vec<f64>, SlideError> {
        self.check_open()?;
        self.geometry_failure()?;
        Ok(self.downsamples.clone())
    }

    fn read_region(
        &self,
        x: u64,
        y: u64,
        level: usize,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, SlideError> {
        self.check_open()?;
        if level >= self.dimensions.len() {
            return Err(SlideError::LevelOutOfRange {
                level,
                level_count: self.dimensions.len(),
            });
        }
        if self.fail_reads {
            return Err(SlideError::Decode {
                message: "scripted read failure".to_string(),
            });
        }

        self.reads.lock().unwrap().push(RegionRead {
            x,
            y,
            level,
            width,
            height,
        });
        Ok(RgbaImage::from_pixel(
            width,
            height,
            Rgba([level as u8 + 1, (x % 256) as u8, (y % 256) as u8, 255]),
        ))
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
