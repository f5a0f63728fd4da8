//! Abbreviated JPEG stream handling.
//!
//! Aperio SVS and some generic TIFFs store tiles as abbreviated JPEG streams:
//! the quantization (DQT) and Huffman (DHT) tables live once in the
//! `JPEGTables` tag and each tile holds only SOI, the scan, and EOI.
//! Decoding such a tile needs `tables - EOI` followed by `tile - SOI`.

use bytes::{Bytes, BytesMut};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const SOS: u8 = 0xDA;
const DQT: u8 = 0xDB;
const DHT: u8 = 0xC4;

/// Whether the stream reaches its first scan without defining any tables.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[0..2] != SOI {
        return false;
    }

    let mut pos = 2;
    while pos + 3 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        match data[pos + 1] {
            DQT | DHT => return false,
            SOS => return true,
            // Fill bytes and standalone markers carry no length
            0xFF | 0x00 | 0x01 | 0xD0..=0xD9 => pos += 2,
            _ => {
                let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + length;
            }
        }
    }

    false
}

/// Splice shared tables into an abbreviated tile stream.
pub fn merge_jpeg_tables(tables: &[u8], tile: &[u8]) -> Bytes {
    if tables.is_empty() || tile.is_empty() {
        return Bytes::copy_from_slice(tile);
    }

    let tables = tables.strip_suffix(&EOI).unwrap_or(tables);
    let tile = tile.strip_prefix(&SOI).unwrap_or(tile);

    let mut merged = BytesMut::with_capacity(tables.len() + tile.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(tile);
    merged.freeze()
}

/// Produce a self-contained JPEG for a tile, merging tables when needed.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile: &[u8]) -> Bytes {
    match tables {
        Some(tables) if is_abbreviated_stream(tile) => merge_jpeg_tables(tables, tile),
        _ => Bytes::copy_from_slice(tile),
    }
}
