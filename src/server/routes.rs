//! Router configuration for the Zarr-over-HTTP front.
//!
//! # Route Structure
//!
//! ```text
//! /health                  - Health check
//! /slides                  - List slides
//! /zarr/{slide}/{*key}     - Store key lookup
//! ```
//!
//! # Example
//!
//! ```ignore
//! use slide_zarr::server::{create_router, RouterConfig, StoreRegistry};
//! use slide_zarr::store::StoreOptions;
//!
//! let registry = StoreRegistry::new("/data/slides", StoreOptions::new(), 32);
//! let router = create_router(registry, RouterConfig::new());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::array::ChunkCache;

use super::handlers::{health_handler, slides_handler, zarr_handler, AppState};
use super::registry::StoreRegistry;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Chunk cache capacity in bytes (0 = no cache)
    pub chunk_cache_capacity: usize,
}

impl RouterConfig {
    /// Any CORS origin, one hour max-age, tracing on, no chunk cache.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
            chunk_cache_capacity: 0,
        }
    }

    pub fn with_chunk_cache_capacity(mut self, bytes: usize) -> Self {
        self.chunk_cache_capacity = bytes;
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router over `registry`.
pub fn create_router(registry: StoreRegistry, config: RouterConfig) -> Router {
    let mut app_state = AppState::new(registry).with_cache_max_age(config.cache_max_age);
    if config.chunk_cache_capacity > 0 {
        app_state = app_state.with_chunk_cache(Arc::new(ChunkCache::with_capacity(
            config.chunk_cache_capacity,
        )));
    }
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/slides", get(slides_handler))
        .route("/zarr/{slide}/{*key}", get(zarr_handler))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
