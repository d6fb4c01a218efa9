//! # Stats Tiler
//!
//! Display post-processing for raster tiles, with a statistics-caching
//! rescale engine.
//!
//! Given a decoded tile (pixels, validity mask, georeferencing, source asset)
//! the crate rescales intensities into an 8-bit display range, optionally
//! equalizes them, removes the overscan buffer and propagates the nodata
//! mask. Rescale statistics come either from the loaded tile or, at high
//! scale, from a full-resolution read of the requested region that is cached
//! with a time-to-live.
//!
//! ## Architecture
//!
//! - [`raster`] - Tile model, decoder seam and world-file reader, PNG encoder
//! - [`stats`] - Band statistics, TTL cache and its stores, region provider
//! - [`algorithm`] - Rescale, mask, crop and equalize primitives and the
//!   registered algorithms
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stats_tiler::{
//!     AlgorithmParameters, RegionStatsProvider, StatsCache, TileProcessor, WorldFileReader,
//!     DEFAULT_SCALE_THRESHOLD, DEFAULT_STATS_TTL,
//! };
//!
//! # async fn run(tile: stats_tiler::ImageTile) -> Result<(), stats_tiler::ProcessError> {
//! let provider = RegionStatsProvider::new(
//!     Arc::new(WorldFileReader::new()),
//!     StatsCache::in_memory(DEFAULT_STATS_TTL),
//!     DEFAULT_SCALE_THRESHOLD,
//! );
//! let processor = TileProcessor::new(provider);
//!
//! let params = AlgorithmParameters::default().with_buffer(0);
//! let _rendered = processor.process("bbox_rescale", tile, &params).await?;
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod config;
pub mod error;
pub mod raster;
pub mod server;
pub mod stats;

pub use algorithm::{
    Algorithm, AlgorithmInfo, AlgorithmParameters, AlgorithmRegistry, TileProcessor,
};
pub use config::Config;
pub use error::{CacheError, ProcessError, ReadError};
pub use raster::{
    AssetReader, BoundingBox, GeoTransform, ImageTile, PngTileEncoder, WorldFileReader,
};
pub use server::{create_router, AppState, RouterConfig};
pub use stats::{
    BandStatistics, MemoryStatsStore, RegionStatsProvider, RespStatsStore, StatsCache,
    StatsCacheKey, StatsStore, DEFAULT_SCALE_THRESHOLD, DEFAULT_STATS_TTL,
};
