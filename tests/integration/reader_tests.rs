//! Pyramid assembly and lazy array access over real slide files.

use std::sync::Arc;

use slide_zarr::array::ChunkCache;
use slide_zarr::error::{ArrayError, ReaderError};
use slide_zarr::reader::{read, read_with_options, ReaderOptions};
use slide_zarr::store::StoreOptions;

use super::test_utils::{pattern, SlideBuilder};

#[test]
fn test_read_builds_one_layer_per_slide() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::new(&[(1024, 768), (512, 384), (256, 192)], 128)
        .write_to(dir.path(), "three.tif");

    let layers = read(&path).unwrap();
    assert_eq!(layers.len(), 1);

    let layer = &layers[0];
    assert_eq!(layer.meta.name, "three.tif");
    let shapes: Vec<Vec<u64>> = layer.pyramid.iter().map(|a| a.shape().to_vec()).collect();
    assert_eq!(
        shapes,
        vec![vec![768, 1024, 4], vec![384, 512, 4], vec![192, 256, 4]]
    );
    assert!(layer.pyramid.iter().all(|a| a.dtype() == "|u1"));
    assert!(layer
        .pyramid
        .iter()
        .all(|a| Arc::ptr_eq(a.store(), layer.store().unwrap())));
}

#[test]
fn test_read_region_crosses_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");
    let options = ReaderOptions::new().with_store_options(StoreOptions::new().with_tile_size(64));

    let layers = read_with_options(&path, options).unwrap();
    let level0 = &layers[0].pyramid[0];

    // 100x90 region starting inside chunk (0, 0), spanning a 3x3 block
    let (y0, x0, h, w) = (40u64, 50u64, 90u64, 100u64);
    let region = level0.read_region(y0, x0, h, w).unwrap();
    assert_eq!(region.len(), (h * w * 4) as usize);

    for (dy, dx) in [(0u64, 0u64), (23, 13), (89, 99), (24, 14), (50, 70)] {
        let i = ((dy * w + dx) * 4) as usize;
        let [r, g, b] = pattern(0, (x0 + dx) as u32, (y0 + dy) as u32);
        assert_eq!(&region[i..i + 4], &[r, g, b, 255], "({dy}, {dx})");
    }
}

#[test]
fn test_read_region_at_array_edge() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");
    let layers = read(&path).unwrap();
    let level1 = &layers[0].pyramid[1];

    // Level 1 is 300x200; the region ends exactly at the corner
    let region = level1.read_region(190, 290, 10, 10).unwrap();
    let last = region.len() - 4;
    let [r, g, b] = pattern(1, 299, 199);
    assert_eq!(&region[last..], &[r, g, b, 255]);

    assert!(matches!(
        level1.read_region(190, 290, 11, 10),
        Err(ArrayError::RegionOutOfBounds { .. })
    ));
}

#[test]
fn test_shared_cache_avoids_repeat_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");
    let cache = Arc::new(ChunkCache::new());
    let options = ReaderOptions::new()
        .with_store_options(StoreOptions::new().with_tile_size(128))
        .with_cache(Arc::clone(&cache));

    let layers = read_with_options(&path, options).unwrap();
    let level0 = &layers[0].pyramid[0];

    let first = level0.chunk(1, 1).unwrap();
    assert_eq!(cache.len(), 1);

    // A closed store can no longer decode, so this must come from the cache
    level0.store().close();
    let second = level0.chunk(1, 1).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_closed_store_yields_fill_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");
    let layers = read(&path).unwrap();
    let level0 = &layers[0].pyramid[0];

    level0.store().close();
    let chunk = level0.chunk(0, 0).unwrap();
    assert_eq!(chunk.len(), level0.chunk_len());
    assert!(chunk.iter().all(|&b| b == 0));
}

#[test]
fn test_chunk_outside_grid_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");
    let layers = read(&path).unwrap();
    let level0 = &layers[0].pyramid[0];

    // 600x400 at the default 512 tile size is a 1x2 grid
    assert_eq!(level0.grid_shape(), vec![1, 2, 1]);
    assert!(matches!(
        level0.chunk(1, 0),
        Err(ArrayError::ChunkOutOfBounds { .. })
    ));
}

#[test]
fn test_unreadable_slide_is_store_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.tif");
    std::fs::write(&path, b"II*\0garbage").unwrap();

    assert!(matches!(read(&path), Err(ReaderError::Store(_))));
}
