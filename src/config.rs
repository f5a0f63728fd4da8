//! Configuration management for slide-zarr.
//!
//! Every command is configured from command-line arguments, with environment
//! variables under the `SLIDE_ZARR_` prefix as fallback and sensible
//! defaults for all optional settings.
//!
//! # Environment Variables
//!
//! - `SLIDE_ZARR_TILE_SIZE` - Chunk edge length in pixels (default: 512)
//! - `SLIDE_ZARR_SLIDE_DIR` - Directory of slides to serve (required by `serve`)
//! - `SLIDE_ZARR_HOST` - Server bind address (default: 0.0.0.0)
//! - `SLIDE_ZARR_PORT` - Server port (default: 3000)
//! - `SLIDE_ZARR_CACHE_STORES` - Max open slides (default: 32)
//! - `SLIDE_ZARR_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `SLIDE_ZARR_CORS_ORIGINS` - Allowed CORS origins, comma-separated
//! - `SLIDE_ZARR_CHUNK_CACHE` - Server chunk cache bytes (default: 64MB)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::array::DEFAULT_CHUNK_CACHE_CAPACITY;
use crate::server::DEFAULT_STORE_CAPACITY;
use crate::store::DEFAULT_TILE_SIZE;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Largest accepted chunk edge; one RGBA chunk stays under 64MB.
pub const MAX_TILE_SIZE: u32 = 4096;

// =============================================================================
// CLI Arguments
// =============================================================================

/// slide-zarr - Pyramidal slides as lazily decoded Zarr v2 stores.
#[derive(Parser, Debug, Clone)]
#[command(name = "slide-zarr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Report whether a file is a pyramidal slide this tool reads.
    Detect(DetectConfig),

    /// Print the synthesized Zarr metadata of a slide.
    Inspect(InspectConfig),

    /// Write the bytes of one store key to stdout or a file.
    Chunk(ChunkConfig),

    /// Serve a directory of slides as Zarr v2 over HTTP.
    Serve(ServeConfig),
}

/// Options shared by every command that opens a store.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Chunk edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "SLIDE_ZARR_TILE_SIZE")]
    pub tile_size: u32,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl StoreArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!("tile_size must be between 1 and {}", MAX_TILE_SIZE));
        }
        Ok(())
    }
}

// =============================================================================
// Detect / Inspect / Chunk
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct DetectConfig {
    /// Path to the candidate file.
    pub path: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Path to the slide.
    pub path: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Also list the store's metadata keys.
    #[arg(long, default_value_t = false)]
    pub keys: bool,
}

impl InspectConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()
    }
}

#[derive(Args, Debug, Clone)]
pub struct ChunkConfig {
    /// Path to the slide.
    pub path: PathBuf,

    /// Store key, e.g. `0/3.4.0` or `.zattrs`.
    pub key: String,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;
        if self.key.is_empty() {
            return Err("key must not be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Directory containing the slide files.
    #[arg(long, env = "SLIDE_ZARR_SLIDE_DIR")]
    pub slide_dir: PathBuf,

    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "SLIDE_ZARR_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "SLIDE_ZARR_PORT")]
    pub port: u16,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Maximum number of slides kept open.
    #[arg(long, default_value_t = DEFAULT_STORE_CAPACITY, env = "SLIDE_ZARR_CACHE_STORES")]
    pub cache_stores: usize,

    /// Chunk cache capacity in bytes (0 disables caching).
    #[arg(long, default_value_t = DEFAULT_CHUNK_CACHE_CAPACITY, env = "SLIDE_ZARR_CHUNK_CACHE")]
    pub chunk_cache: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "SLIDE_ZARR_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "SLIDE_ZARR_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;

        if self.slide_dir.as_os_str().is_empty() {
            return Err(
                "Slide directory is required. Set --slide-dir or SLIDE_ZARR_SLIDE_DIR".to_string(),
            );
        }
        if !self.slide_dir.is_dir() {
            return Err(format!(
                "Slide directory does not exist: {}",
                self.slide_dir.display()
            ));
        }
        if self.cache_stores == 0 {
            return Err("cache_stores must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================
