//! Chunk-grid to level-0 pixel mapping.

/// Level-0 pixel origin `(x, y)` of chunk `(row, col)` at a level with the
/// given downsample factor.
///
/// `x = floor(col * downsample * tile_size)`, likewise for `y` with `row`.
pub fn base_origin(row: u64, col: u64, downsample: f64, tile_size: u32) -> (u64, u64) {
    let scale = downsample * tile_size as f64;
    let x = (col as f64 * scale).floor() as u64;
    let y = (row as f64 * scale).floor() as u64;
    (x, y)
}
