//! slide-zarr - Pyramidal slides as lazily decoded Zarr v2 stores.
//!
//! This binary inspects slides from the command line and serves slide
//! directories over HTTP.

use std::fs;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slide_zarr::{
    config::{ChunkConfig, Cli, Command, DetectConfig, InspectConfig, ServeConfig, StoreArgs},
    reader::{detect, Source},
    server::{create_router, RouterConfig, StoreRegistry},
    slide::{PROPERTY_NAME_LEVEL_COUNT, PROPERTY_NAME_VENDOR},
    store::{array_meta_key, ChunkStore, StoreOptions, ATTRS_KEY, GROUP_META_KEY},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Detect(config) => run_detect(config),
        Command::Inspect(config) => run_inspect(config),
        Command::Chunk(config) => run_chunk(config),
        Command::Serve(config) => run_serve(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.store.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("slide-zarr v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Slide directory: {}", config.slide_dir.display());
    info!("  Tile size: {}", config.store.tile_size);
    info!(
        "  Cache: {} open slides, {}MB chunks",
        config.cache_stores,
        config.chunk_cache / (1024 * 1024)
    );

    let registry = StoreRegistry::new(
        &config.slide_dir,
        store_options(&config.store),
        config.cache_stores,
    );

    match registry.list() {
        Ok(slides) => info!("  Found {} slide(s)", slides.len()),
        Err(e) => {
            error!("  Failed to list slides: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let router = create_router(registry, build_router_config(&config));
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/slides", addr);
    info!("    curl http://{}/zarr/<slide>/.zattrs", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "slide_zarr=debug,tower_http=debug"
    } else {
        "slide_zarr=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_chunk_cache_capacity(config.chunk_cache)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

fn store_options(args: &StoreArgs) -> StoreOptions {
    StoreOptions::new().with_tile_size(args.tile_size)
}

// =============================================================================
// Detect Command
// =============================================================================

fn run_detect(config: DetectConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    match detect(&Source::from(config.path.as_path())) {
        Ok(Some(_)) => {
            println!("✓ {}: pyramidal slide", config.path.display());
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("✗ {}: not handled by this reader", config.path.display());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

fn run_inspect(config: InspectConfig) -> ExitCode {
    if config.store.verbose {
        init_logging(true);
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let store = match ChunkStore::open(&config.path, store_options(&config.store)) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Slide: {}", store.source().display());
    if let Some(vendor) = store.property(PROPERTY_NAME_VENDOR) {
        println!("Vendor: {}", vendor);
    }
    if let Some(levels) = store.property(PROPERTY_NAME_LEVEL_COUNT) {
        println!("Levels: {}", levels);
    }
    println!("Tile size: {}", store.tile_size());
    println!();

    let mut documents = vec![GROUP_META_KEY.to_string(), ATTRS_KEY.to_string()];
    documents.extend((0..store.level_count()).map(array_meta_key));

    for key in &documents {
        match store.get(key) {
            Ok(bytes) => {
                println!("── {} ──", key);
                println!("{}", String::from_utf8_lossy(&bytes));
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if config.keys {
        println!();
        println!("Keys:");
        for key in store.keys() {
            println!("  {}", key);
        }
        println!("Total: {} key(s)", store.len());
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Chunk Command
// =============================================================================

fn run_chunk(config: ChunkConfig) -> ExitCode {
    if config.store.verbose {
        init_logging(true);
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let store = match ChunkStore::open(&config.path, store_options(&config.store)) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let data = match store.get(&config.key) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let written = match config.output {
        Some(ref output) => fs::write(output, &data),
        None => std::io::stdout().lock().write_all(&data),
    };
    if let Err(e) = written {
        eprintln!("Error: failed to write {} bytes: {}", data.len(), e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
