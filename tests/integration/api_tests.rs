//! API integration tests for Zarr-over-HTTP.
//!
//! Tests verify:
//! - Metadata and chunk retrieval with content types and cache headers
//! - Slide listing through the format gate
//! - Error cases (unknown slide, bad id, missing key)

use std::path::Path;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use slide_zarr::server::{StoreRegistry, CHUNK_CONTENT_TYPE, JSON_CONTENT_TYPE};
use slide_zarr::store::StoreOptions;
use slide_zarr::{create_router, RouterConfig};

use super::test_utils::{chunk_pixel, pattern, SlideBuilder};

fn slide_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    SlideBuilder::two_level().write_to(dir.path(), "slide.tif");
    SlideBuilder::new(&[(256, 256)], 128).write_to(dir.path(), "flat.tif");
    std::fs::write(dir.path().join("notes.txt"), b"not a slide").unwrap();
    dir
}

fn router(root: &Path, config: RouterConfig) -> Router {
    let registry = StoreRegistry::new(root, StoreOptions::new().with_tile_size(128), 4);
    create_router(registry, config.with_tracing(false))
}

async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

// =============================================================================
// Health and Listing
// =============================================================================

#[tokio::test]
async fn test_health() {
    let dir = slide_dir();
    let (status, _, body) = get(router(dir.path(), RouterConfig::new()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_slides_lists_only_pyramids() {
    let dir = slide_dir();
    let (status, _, body) = get(router(dir.path(), RouterConfig::new()), "/slides").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["slides"], serde_json::json!(["slide.tif"]));
}

#[tokio::test]
async fn test_cors_preflight_allows_content_type_only() {
    let dir = slide_dir();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/zarr/slide.tif/.zattrs")
        .header("origin", "https://viewer.example")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = router(dir.path(), RouterConfig::new())
        .oneshot(request)
        .await
        .unwrap();

    let allowed = response
        .headers()
        .get("access-control-allow-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert_eq!(allowed, "content-type");
}

// =============================================================================
// Store Keys
// =============================================================================

#[tokio::test]
async fn test_metadata_served_as_json() {
    let dir = slide_dir();
    let app = router(dir.path(), RouterConfig::new().with_cache_max_age(60));

    let (status, headers, body) = get(app.clone(), "/zarr/slide.tif/.zattrs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), JSON_CONTENT_TYPE);
    assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=60");
    let attrs: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(attrs["multiscales"][0]["datasets"][1]["path"], "1");

    let (status, headers, body) = get(app, "/zarr/slide.tif/1/.zarray").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), JSON_CONTENT_TYPE);
    let meta: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(meta["shape"], serde_json::json!([200, 300, 4]));
    assert_eq!(meta["chunks"], serde_json::json!([128, 128, 4]));
}

#[tokio::test]
async fn test_chunk_served_as_octet_stream() {
    let dir = slide_dir();
    let (status, headers, body) = get(
        router(dir.path(), RouterConfig::new()),
        "/zarr/slide.tif/0/1.2.0",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), CHUNK_CONTENT_TYPE);
    assert_eq!(body.len(), 128 * 128 * 4);

    let [r, g, b] = pattern(0, 256 + 3, 128 + 4);
    assert_eq!(chunk_pixel(&body, 128, 3, 4), [r, g, b, 255]);
}

#[tokio::test]
async fn test_chunk_cache_header() {
    let dir = slide_dir();
    let app = router(
        dir.path(),
        RouterConfig::new().with_chunk_cache_capacity(1 << 20),
    );

    let (_, headers, first) = get(app.clone(), "/zarr/slide.tif/0/0.0.0").await;
    assert_eq!(headers.get("x-chunk-cache-hit").unwrap(), "false");

    let (_, headers, second) = get(app.clone(), "/zarr/slide.tif/0/0.0.0").await;
    assert_eq!(headers.get("x-chunk-cache-hit").unwrap(), "true");
    assert_eq!(first, second);

    // Metadata never goes through the chunk cache
    let (_, headers, _) = get(app, "/zarr/slide.tif/.zgroup").await;
    assert!(headers.get("x-chunk-cache-hit").is_none());
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_missing_key_is_404() {
    let dir = slide_dir();
    let app = router(dir.path(), RouterConfig::new());

    for uri in [
        "/zarr/slide.tif/5/0.0.0",
        "/zarr/slide.tif/0/9.9.0",
        "/zarr/slide.tif/0/not-a-key",
        "/zarr/slide.tif/2/.zarray",
    ] {
        let (status, _, body) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["status"], 404);
    }
}

#[tokio::test]
async fn test_unknown_or_rejected_slide_is_404() {
    let dir = slide_dir();
    let app = router(dir.path(), RouterConfig::new());

    for uri in ["/zarr/absent.tif/.zgroup", "/zarr/flat.tif/.zgroup"] {
        let (status, _, _) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_invalid_slide_id_is_400() {
    let dir = slide_dir();
    let app = router(dir.path(), RouterConfig::new());

    for uri in ["/zarr/..%2Fslide.tif/.zgroup", "/zarr/notes.txt/.zgroup"] {
        let (status, _, body) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_slide_id");
    }
}
