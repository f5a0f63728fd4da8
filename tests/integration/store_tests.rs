//! Chunk store over real slide files.

use std::sync::Arc;
use std::thread;

use serde_json::{json, Value};

use slide_zarr::error::{NotFoundReason, StoreError};
use slide_zarr::slide::{PROPERTY_NAME_LEVEL_COUNT, PROPERTY_NAME_VENDOR};
use slide_zarr::store::{ChunkStore, StoreOptions};

use super::test_utils::{
    chunk_pixel, close_to, pattern, ByteOrderType, SlideBuilder, TileEncoding,
};

fn open(builder: &SlideBuilder, tile: u32) -> (tempfile::TempDir, ChunkStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = builder.write_to(dir.path(), "slide.tif");
    let store = ChunkStore::open(&path, StoreOptions::new().with_tile_size(tile)).unwrap();
    (dir, store)
}

fn json_doc(store: &ChunkStore, key: &str) -> Value {
    serde_json::from_slice(&store.get(key).unwrap()).unwrap()
}

fn reason(err: StoreError) -> NotFoundReason {
    match err {
        StoreError::NotFound { reason, .. } => reason,
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_metadata_documents() {
    let (_dir, store) = open(&SlideBuilder::two_level(), 256);

    assert_eq!(json_doc(&store, ".zgroup"), json!({"zarr_format": 2}));

    let attrs = json_doc(&store, ".zattrs");
    assert_eq!(
        attrs["multiscales"][0]["datasets"],
        json!([{"path": "0"}, {"path": "1"}])
    );
    assert_eq!(attrs["multiscales"][0]["name"], "slide.tif");

    let level0 = json_doc(&store, "0/.zarray");
    assert_eq!(level0["shape"], json!([400, 600, 4]));
    assert_eq!(level0["chunks"], json!([256, 256, 4]));
    assert_eq!(level0["dtype"], "|u1");
    assert_eq!(level0["order"], "C");
    assert_eq!(level0["compressor"], Value::Null);
    assert_eq!(level0["zarr_format"], 2);

    let level1 = json_doc(&store, "1/.zarray");
    assert_eq!(level1["shape"], json!([200, 300, 4]));

    let mut keys: Vec<&str> = store.keys().collect();
    keys.sort();
    assert_eq!(keys, vec![".zattrs", ".zgroup", "0/.zarray", "1/.zarray"]);
}

#[test]
fn test_chunk_pixels_match_slide() {
    let (_dir, store) = open(&SlideBuilder::two_level(), 256);

    let chunk = store.get("0/0.0.0").unwrap();
    assert_eq!(chunk.len(), 256 * 256 * 4);
    for (x, y) in [(0, 0), (10, 20), (127, 127), (128, 0), (255, 255)] {
        let [r, g, b] = pattern(0, x, y);
        assert_eq!(chunk_pixel(&chunk, 256, x, y), [r, g, b, 255], "({x}, {y})");
    }

    // Chunk (1, 2) of level 0 starts at (512, 256)
    let chunk = store.get("0/1.2.0").unwrap();
    let [r, g, b] = pattern(0, 512, 256);
    assert_eq!(chunk_pixel(&chunk, 256, 0, 0), [r, g, b, 255]);
}

#[test]
fn test_coarser_level_chunks() {
    let (_dir, store) = open(&SlideBuilder::two_level(), 128);

    // Level 1 chunk (1, 1) starts at level pixel (128, 128)
    let chunk = store.get("1/1.1.0").unwrap();
    let [r, g, b] = pattern(1, 128 + 5, 128 + 7);
    assert_eq!(chunk_pixel(&chunk, 128, 5, 7), [r, g, b, 255]);
}

#[test]
fn test_edge_chunk_is_full_size_and_padded() {
    let (_dir, store) = open(&SlideBuilder::two_level(), 256);

    // Level 0 is 600x400: chunk (1, 2) covers x 512..768, y 256..512
    let chunk = store.get("0/1.2.0").unwrap();
    assert_eq!(chunk.len(), 256 * 256 * 4);

    let [r, g, b] = pattern(0, 599, 399);
    assert_eq!(chunk_pixel(&chunk, 256, 87, 143), [r, g, b, 255]);
    assert_eq!(chunk_pixel(&chunk, 256, 88, 0), [0, 0, 0, 0]);
    assert_eq!(chunk_pixel(&chunk, 256, 0, 144), [0, 0, 0, 0]);
    assert_eq!(chunk_pixel(&chunk, 256, 255, 255), [0, 0, 0, 0]);
}

#[test]
fn test_variants_decode_identically() {
    let builders = [
        SlideBuilder::two_level(),
        SlideBuilder::two_level().with_byte_order(ByteOrderType::BigEndian),
        SlideBuilder::two_level().with_bigtiff(true),
    ];
    let chunks: Vec<_> = builders
        .iter()
        .map(|b| open(b, 256).1.get("1/0.1.0").unwrap())
        .collect();

    assert_eq!(chunks[0], chunks[1]);
    assert_eq!(chunks[0], chunks[2]);
}

#[test]
fn test_jpeg_tiles_decode_close_to_source() {
    let builder = SlideBuilder::two_level().with_encoding(TileEncoding::Jpeg { quality: 95 });
    let (_dir, store) = open(&builder, 128);

    let chunk = store.get("0/1.1.0").unwrap();
    // Flat-ish area away from the wrap-around of the pattern
    let actual = chunk_pixel(&chunk, 128, 20, 20);
    assert!(close_to(actual, pattern(0, 148, 148), 12), "{actual:?}");
}

#[test]
fn test_not_found_reasons() {
    let (_dir, store) = open(&SlideBuilder::two_level(), 256);

    assert_eq!(reason(store.get("junk").unwrap_err()), NotFoundReason::Malformed);
    assert_eq!(reason(store.get("0/0.0").unwrap_err()), NotFoundReason::Malformed);
    assert_eq!(reason(store.get("0/0.0.c").unwrap_err()), NotFoundReason::Malformed);
    assert_eq!(
        reason(store.get("2/0.0.0").unwrap_err()),
        NotFoundReason::LevelOutOfRange
    );
    assert_eq!(
        reason(store.get("2/.zarray").unwrap_err()),
        NotFoundReason::Malformed
    );
    assert_eq!(
        reason(store.get("0/2.0.0").unwrap_err()),
        NotFoundReason::ChunkOutOfGrid
    );
    assert_eq!(
        reason(store.get("0/0.3.0").unwrap_err()),
        NotFoundReason::ChunkOutOfGrid
    );
}

#[test]
fn test_contains_checks_level_only() {
    let (_dir, store) = open(&SlideBuilder::two_level(), 256);

    assert!(store.contains(".zgroup"));
    assert!(store.contains("1/.zarray"));
    assert!(store.contains("0/0.0.0"));
    assert!(store.contains("0/99.99.0"));
    assert!(!store.contains("2/0.0.0"));
    assert!(!store.contains("0/a.b.0"));
}

#[test]
fn test_close_is_idempotent_and_final() {
    let (_dir, store) = open(&SlideBuilder::two_level(), 256);
    assert!(store.get("0/0.0.0").is_ok());

    store.close();
    store.close();
    assert!(store.is_closed());

    assert_eq!(
        reason(store.get("0/0.0.0").unwrap_err()),
        NotFoundReason::Closed
    );
    // Metadata survives close
    assert!(store.get(".zattrs").is_ok());
}

#[test]
fn test_properties_exposed() {
    let builder = SlideBuilder::two_level().with_description("Aperio Image Library v12|AppMag = 20");
    let (_dir, store) = open(&builder, 256);

    assert_eq!(store.property(PROPERTY_NAME_VENDOR).as_deref(), Some("aperio"));
    assert_eq!(store.property(PROPERTY_NAME_LEVEL_COUNT).as_deref(), Some("2"));
}

#[test]
fn test_concurrent_reads_agree() {
    let (_dir, store) = open(&SlideBuilder::two_level(), 128);
    let store = Arc::new(store);
    let expected = store.get("0/2.3.0").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.get("0/2.3.0").unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_open_failures() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.tif");
    assert!(matches!(
        ChunkStore::open(&missing, StoreOptions::new()),
        Err(StoreError::Construction(_))
    ));

    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");
    assert!(matches!(
        ChunkStore::open(&path, StoreOptions::new().with_tile_size(0)),
        Err(StoreError::InvalidTileSize)
    ));
}

#[test]
fn test_equal_when_opened_through_different_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");
    let other = SlideBuilder::two_level().write_to(dir.path(), "other.tif");
    let dotted = dir.path().join(".").join("slide.tif");

    let a = ChunkStore::open(&path, StoreOptions::new()).unwrap();
    let b = ChunkStore::open(&dotted, StoreOptions::new()).unwrap();
    let c = ChunkStore::open(&other, StoreOptions::new()).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_closing_one_store_leaves_others_open() {
    let dir = tempfile::tempdir().unwrap();
    let first = SlideBuilder::two_level().write_to(dir.path(), "first.tif");
    let second = SlideBuilder::two_level().write_to(dir.path(), "second.tif");

    let a = ChunkStore::open(&first, StoreOptions::new()).unwrap();
    let b = ChunkStore::open(&second, StoreOptions::new()).unwrap();

    a.close();
    a.close();

    assert!(a.is_closed());
    assert!(!b.is_closed());
    assert_eq!(b.get("0/0.0.0").unwrap().len(), 512 * 512 * 4);
}
