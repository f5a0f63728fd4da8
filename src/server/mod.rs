//! HTTP server layer: slides served as read-only Zarr v2 over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                 GET /zarr/{slide}/{*key}                        │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │  registry   │  │        routes           │  │
//! │  │ (requests)  │  │ (LRU stores)│  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod registry;
pub mod routes;

pub use handlers::{
    content_type_for, health_handler, slides_handler, zarr_handler, AppState, ErrorResponse,
    HandlerError, HealthResponse, SlidesResponse, CHUNK_CONTENT_TYPE, JSON_CONTENT_TYPE,
};
pub use registry::{StoreRegistry, DEFAULT_STORE_CAPACITY};
pub use routes::{create_router, RouterConfig};
