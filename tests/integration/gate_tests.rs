//! Format gate against real files on disk.

use std::path::PathBuf;

use slide_zarr::reader::{detect, Source};

use super::test_utils::{ByteOrderType, SlideBuilder, TileEncoding};

#[test]
fn test_accepts_pyramidal_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");

    let read = detect(&Source::from(path.as_path())).unwrap();
    assert!(read.is_some());
}

#[test]
fn test_accepts_tiff_suffix_and_variants() {
    let dir = tempfile::tempdir().unwrap();
    let variants = [
        SlideBuilder::two_level().with_byte_order(ByteOrderType::BigEndian),
        SlideBuilder::two_level().with_bigtiff(true),
        SlideBuilder::two_level()
            .with_bigtiff(true)
            .with_byte_order(ByteOrderType::BigEndian),
        SlideBuilder::two_level().with_encoding(TileEncoding::Jpeg { quality: 90 }),
    ];

    for (i, builder) in variants.iter().enumerate() {
        let path = builder.write_to(dir.path(), &format!("variant-{i}.tiff"));
        assert!(
            detect(&Source::from(path.as_path())).unwrap().is_some(),
            "variant {i}"
        );
    }
}

#[test]
fn test_rejects_wrong_suffix_even_if_readable() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["slide.svs", "slide.TIF", "slide.tif.bak"] {
        let path = SlideBuilder::two_level().write_to(dir.path(), name);
        assert!(detect(&Source::from(path.as_path())).unwrap().is_none(), "{name}");
    }
}

#[test]
fn test_rejects_path_lists() {
    let dir = tempfile::tempdir().unwrap();
    let a = SlideBuilder::two_level().write_to(dir.path(), "a.tif");
    let b = SlideBuilder::two_level().write_to(dir.path(), "b.tif");

    assert!(detect(&Source::Many(vec![a.clone()])).unwrap().is_none());
    assert!(detect(&Source::Many(vec![a, b])).unwrap().is_none());
}

#[test]
fn test_rejects_single_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::new(&[(512, 512)], 256).write_to(dir.path(), "flat.tif");

    assert!(detect(&Source::from(path.as_path())).unwrap().is_none());
}

#[test]
fn test_rejects_ome_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let ome = r#"<?xml version="1.0"?><OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06"></OME>"#;
    let path = SlideBuilder::two_level()
        .with_description(ome)
        .write_to(dir.path(), "image.ome.tif");

    assert!(detect(&Source::from(path.as_path())).unwrap().is_none());
}

#[test]
fn test_accepts_ome_marker_not_at_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level()
        .with_description("<OME> followed by something else")
        .write_to(dir.path(), "not-ome.tif");

    assert!(detect(&Source::from(path.as_path())).unwrap().is_some());
}

#[test]
fn test_rejects_unreadable_contents() {
    let dir = tempfile::tempdir().unwrap();

    let garbage = dir.path().join("garbage.tif");
    std::fs::write(&garbage, b"definitely not a tiff file").unwrap();
    assert!(detect(&Source::from(garbage.as_path())).unwrap().is_none());

    let truncated = dir.path().join("truncated.tif");
    let mut data = SlideBuilder::two_level().build();
    data.truncate(data.len() / 2);
    std::fs::write(&truncated, data).unwrap();
    assert!(detect(&Source::from(truncated.as_path())).unwrap().is_none());
}

#[test]
fn test_rejects_oversized_ifd_entry_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge-ifd.tif");

    let mut data = vec![0x49, 0x49, 0x2B, 0x00, 0x08, 0x00, 0x00, 0x00];
    data.extend_from_slice(&16u64.to_le_bytes());
    data.extend_from_slice(&(1u64 << 62).to_le_bytes());
    data.resize(48, 0);
    std::fs::write(&path, data).unwrap();

    assert!(detect(&Source::from(path.as_path())).unwrap().is_none());
}

#[test]
fn test_rejects_stripped_first_ifd() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level()
        .with_stripped_first_ifd()
        .write_to(dir.path(), "stripped.tif");

    assert!(detect(&Source::from(path.as_path())).unwrap().is_none());
}

#[test]
fn test_rejects_unsupported_compression() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level()
        .with_encoding(TileEncoding::Lzw)
        .write_to(dir.path(), "lzw.tif");

    assert!(detect(&Source::from(path.as_path())).unwrap().is_none());
}

#[test]
fn test_rejects_directory() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("folder.tif");
    std::fs::create_dir(&folder).unwrap();

    assert!(detect(&Source::from(folder.as_path())).unwrap().is_none());
}

#[test]
fn test_missing_file_is_environment_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing: PathBuf = dir.path().join("missing.tif");

    assert!(detect(&Source::from(missing.as_path())).is_err());
}

#[test]
fn test_entry_point_reads_layers() {
    let dir = tempfile::tempdir().unwrap();
    let path = SlideBuilder::two_level().write_to(dir.path(), "slide.tif");

    let read = detect(&Source::from(path.as_path())).unwrap().unwrap();
    let layers = read(&path).unwrap();

    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].pyramid.len(), 2);
    assert_eq!(layers[0].meta.name, "slide.tif");
}
