//! HTTP request handlers for the Zarr-over-HTTP API.
//!
//! # Endpoints
//!
//! - `GET /zarr/{slide}/{*key}` - Serve a store key (metadata or chunk)
//! - `GET /slides` - List the slides the format gate accepts
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::array::{ChunkCache, ChunkCacheKey};
use crate::error::{IoError, RegistryError, StoreError};
use crate::store::ChunkKey;

use super::registry::StoreRegistry;

/// Content type of metadata documents
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type of chunk payloads
pub const CHUNK_CONTENT_TYPE: &str = "application/octet-stream";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state, passed to handlers via Axum's State extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<StoreRegistry>,

    /// Chunk payloads shared across slides, keyed by slide and level
    pub chunk_cache: Option<Arc<ChunkCache>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,
}

impl AppState {
    pub fn new(registry: StoreRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            chunk_cache: None,
            cache_max_age: 3600,
        }
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }

    pub fn with_chunk_cache(mut self, cache: Arc<ChunkCache>) -> Self {
        self.chunk_cache = Some(cache);
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_slide_id")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response from the slides list endpoint.
#[derive(Debug, Serialize)]
pub struct SlidesResponse {
    /// Slide file names, usable as the `{slide}` path segment
    pub slides: Vec<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum HandlerError {
    Registry(RegistryError),
    Store(StoreError),
    /// A blocking task panicked or was cancelled
    Internal(String),
}

impl From<RegistryError> for HandlerError {
    fn from(err: RegistryError) -> Self {
        HandlerError::Registry(err)
    }
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        HandlerError::Store(err)
    }
}

impl From<tokio::task::JoinError> for HandlerError {
    fn from(err: tokio::task::JoinError) -> Self {
        HandlerError::Internal(err.to_string())
    }
}

impl HandlerError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            HandlerError::Store(err @ StoreError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            HandlerError::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                err.to_string(),
            ),

            HandlerError::Registry(RegistryError::InvalidSlideId(id)) => (
                StatusCode::BAD_REQUEST,
                "invalid_slide_id",
                format!("Invalid slide id: {}", id),
            ),
            HandlerError::Registry(RegistryError::SlideNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Slide not found: {}", id),
            ),
            HandlerError::Registry(RegistryError::Io(IoError::NotFound(path))) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Resource not found: {}", path),
            ),
            HandlerError::Registry(RegistryError::Io(io_err)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                format!("I/O error: {}", io_err),
            ),
            HandlerError::Registry(RegistryError::Store(err)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                err.to_string(),
            ),

            HandlerError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message.clone(),
            ),
        }
    }
}

/// Logs by severity: 5xx at ERROR, 404 at DEBUG, other 4xx at WARN.
impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.classify();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle store key requests.
///
/// # Endpoint
///
/// `GET /zarr/{slide}/{*key}`
///
/// # Response
///
/// - `200 OK`: the stored bytes; `application/json` for `.zgroup`,
///   `.zattrs` and `.zarray` keys, `application/octet-stream` for chunks
/// - `400 Bad Request`: slide id would leave the slide directory
/// - `404 Not Found`: unknown slide, or a key the store does not hold
/// - `500 Internal Server Error`: the slide could not be opened
///
/// # Headers
///
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Chunk-Cache-Hit: true|false` (chunk keys, when a cache is configured)
pub async fn zarr_handler(
    State(state): State<AppState>,
    Path((slide, key)): Path<(String, String)>,
) -> Result<Response, HandlerError> {
    let content_type = content_type_for(&key);
    let cache_key = state
        .chunk_cache
        .as_ref()
        .and_then(|_| ChunkKey::parse(&key))
        .map(|chunk| {
            ChunkCacheKey::new(format!("{}#{}", slide, chunk.level), chunk.row, chunk.col)
        });

    let cached = match (&state.chunk_cache, &cache_key) {
        (Some(cache), Some(cache_key)) => cache.get(cache_key),
        _ => None,
    };
    let cache_hit = cached.is_some();

    let data = match cached {
        Some(data) => data,
        None => {
            let registry = Arc::clone(&state.registry);
            let data = tokio::task::spawn_blocking(move || -> Result<_, HandlerError> {
                let store = registry.get(&slide)?;
                Ok(store.get(&key)?)
            })
            .await??;

            if let (Some(cache), Some(cache_key)) = (&state.chunk_cache, cache_key.clone()) {
                cache.put(cache_key, data.clone());
            }
            data
        }
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        );
    if cache_key.is_some() {
        builder = builder.header("X-Chunk-Cache-Hit", cache_hit.to_string());
    }

    builder
        .body(Body::from(data))
        .map_err(|e| HandlerError::Internal(e.to_string()))
}

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle slides list requests.
///
/// `GET /slides` returns the sorted file names of every pyramidal slide in
/// the slide directory.
pub async fn slides_handler(
    State(state): State<AppState>,
) -> Result<Json<SlidesResponse>, HandlerError> {
    let registry = Arc::clone(&state.registry);
    let slides = tokio::task::spawn_blocking(move || registry.list()).await??;

    Ok(Json(SlidesResponse { slides }))
}

/// Metadata documents are the keys whose last segment starts with `.z`.
pub fn content_type_for(key: &str) -> &'static str {
    let last = key.rsplit('/').next().unwrap_or(key);
    if last.starts_with(".z") {
        JSON_CONTENT_TYPE
    } else {
        CHUNK_CONTENT_TYPE
    }
}

// =============================================================================
// Tests
// =============================================================================
