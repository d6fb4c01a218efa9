//! Stats Tiler - display post-processing server for raster tiles.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stats_tiler::{
    config::Config,
    server::{create_router, AppState, RouterConfig},
    stats::{MemoryStatsStore, RegionStatsProvider, RespStatsStore, StatsCache, StatsStore},
    TileProcessor,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    run_serve(config).await
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: Config) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Stats Tiler v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");

    let store = build_store(&config);
    info!(
        "  Statistics cache: {} (ttl {}s)",
        store.backend(),
        config.cache_ttl
    );
    info!("  Scale threshold: {}", config.scale_threshold);
    info!(
        "  Defaults: buffer {}px, tile size {}px, CLAHE clip {} grid {}",
        config.buffer, config.tile_size, config.clahe_clip_limit, config.clahe_grid
    );
    match &config.asset_root {
        Some(root) => info!("  Asset root: {}", root.display()),
        None => info!("  Asset root: (working directory)"),
    }

    if let Some(nodata) = config.nodata {
        info!("  Nodata value: {}", nodata);
    }
    info!("  Response max-age: {}s", config.cache_max_age);

    let reader = config.asset_reader();
    let cache = StatsCache::new(store, config.cache_ttl());
    let provider = RegionStatsProvider::new(Arc::new(reader), cache, config.scale_threshold);
    let processor = TileProcessor::new(provider).with_clahe(config.clahe_clip_limit, config.clahe_grid);

    let state = AppState::new(processor)
        .with_defaults(config.buffer, config.tile_size)
        .with_cache_max_age(config.cache_max_age);
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/algorithms", addr);
    info!(
        "    curl 'http://{}/bbox/<minx>,<miny>,<maxx>,<maxy>.png?url=<asset>'",
        addr
    );
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

/// Pick the statistics store: RESP when a cache host is configured,
/// in-process otherwise.
fn build_store(config: &Config) -> Arc<dyn StatsStore> {
    match &config.cache_host {
        Some(host) => {
            info!("  Statistics store: {}:{}", host, config.cache_port);
            Arc::new(
                RespStatsStore::new(host, config.cache_port).with_timeout(config.cache_timeout()),
            )
        }
        None => {
            warn!("  No cache host set, statistics are cached in process only");
            Arc::new(MemoryStatsStore::with_capacity(config.cache_entries))
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "stats_tiler=debug,tower_http=debug"
    } else {
        "stats_tiler=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new();

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}
