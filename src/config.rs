//! Configuration management for the stats tiler.
//!
//! Configuration comes from command-line arguments and environment variables
//! with the `TILER_` prefix, with defaults for every setting.
//!
//! # Example
//!
//! ```ignore
//! use stats_tiler::config::Config;
//!
//! let config = Config::parse();
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `TILER_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILER_PORT` - Server port (default: 8000)
//! - `TILER_CACHE_HOST` - Statistics store host; unset uses an in-process store
//! - `TILER_CACHE_PORT` - Statistics store port (default: 6379)
//! - `TILER_CACHE_TTL` - Statistics time-to-live in seconds (default: 3600)
//! - `TILER_CACHE_TIMEOUT_MS` - Statistics store round-trip timeout (default: 250)
//! - `TILER_CACHE_ENTRIES` - Bound of the in-process store (default: 10000)
//! - `TILER_SCALE_THRESHOLD` - Scale above which region statistics are read (default: 8)
//! - `TILER_BUFFER` - Default overscan buffer in pixels (default: 512)
//! - `TILER_TILE_SIZE` - Default tile size in pixels (default: 256)
//! - `TILER_CLAHE_CLIP_LIMIT` - Default adaptive equalization clip limit (default: 2.0)
//! - `TILER_CLAHE_GRID` - Default adaptive equalization grid per side (default: 3)
//! - `TILER_READ_TIMEOUT_MS` - Timeout of one asset part read (default: 10000)
//! - `TILER_ASSET_ROOT` - Directory relative asset paths resolve against
//! - `TILER_NODATA` - Sample value read as missing data (e.g. 0 or -9999)
//! - `TILER_CACHE_MAX_AGE` - `Cache-Control` max-age of PNG responses (default: 3600)
//! - `TILER_CORS_ORIGINS` - Allowed CORS origins (comma-separated)

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::algorithm::{DEFAULT_BUFFER, DEFAULT_CLIP_LIMIT, DEFAULT_GRID, DEFAULT_TILE_SIZE};
use crate::raster::WorldFileReader;
use crate::stats::{DEFAULT_MEMORY_STORE_ENTRIES, DEFAULT_SCALE_THRESHOLD};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default statistics store port.
pub const DEFAULT_CACHE_PORT: u16 = 6379;

/// Default statistics TTL in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Default statistics store timeout in milliseconds.
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 250;

/// Default asset read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Stats Tiler - display post-processing for raster tiles.
///
/// Serves rescaled and equalized 8-bit PNG renderings of georeferenced
/// raster parts, caching full-resolution region statistics.
#[derive(Parser, Debug, Clone)]
#[command(name = "stats-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILER_PORT")]
    pub port: u16,

    /// `Cache-Control` max-age of rendered parts in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "TILER_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // Statistics Cache Configuration
    // =========================================================================
    /// Host of the RESP statistics store.
    ///
    /// If not specified, statistics are cached in process.
    #[arg(long, env = "TILER_CACHE_HOST")]
    pub cache_host: Option<String>,

    /// Port of the RESP statistics store.
    #[arg(long, default_value_t = DEFAULT_CACHE_PORT, env = "TILER_CACHE_PORT")]
    pub cache_port: u16,

    /// Time-to-live of cached statistics in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_SECS, env = "TILER_CACHE_TTL")]
    pub cache_ttl: u64,

    /// Statistics store round-trip timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_TIMEOUT_MS, env = "TILER_CACHE_TIMEOUT_MS")]
    pub cache_timeout_ms: u64,

    /// Maximum entries held by the in-process store.
    #[arg(long, default_value_t = DEFAULT_MEMORY_STORE_ENTRIES, env = "TILER_CACHE_ENTRIES")]
    pub cache_entries: usize,

    /// Scale above which statistics come from a cached full-resolution read.
    #[arg(long, default_value_t = DEFAULT_SCALE_THRESHOLD, env = "TILER_SCALE_THRESHOLD")]
    pub scale_threshold: u32,

    // =========================================================================
    // Algorithm Defaults
    // =========================================================================
    /// Default overscan buffer in pixels.
    #[arg(long, default_value_t = DEFAULT_BUFFER, env = "TILER_BUFFER")]
    pub buffer: usize,

    /// Default published tile size in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "TILER_TILE_SIZE")]
    pub tile_size: usize,

    /// Default clip limit of adaptive equalization.
    #[arg(long, default_value_t = DEFAULT_CLIP_LIMIT, env = "TILER_CLAHE_CLIP_LIMIT")]
    pub clahe_clip_limit: f32,

    /// Default adaptive equalization grid (tiles per side).
    #[arg(long, default_value_t = DEFAULT_GRID, env = "TILER_CLAHE_GRID")]
    pub clahe_grid: usize,

    // =========================================================================
    // Asset Configuration
    // =========================================================================
    /// Directory that relative asset paths resolve against.
    #[arg(long, env = "TILER_ASSET_ROOT")]
    pub asset_root: Option<PathBuf>,

    /// Timeout of a single asset part read in milliseconds.
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_MS, env = "TILER_READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Sample value treated as missing data in assets.
    #[arg(long, env = "TILER_NODATA", allow_hyphen_values = true)]
    pub nodata: Option<f32>,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TILER_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_ttl == 0 {
            return Err("cache_ttl must be greater than 0".to_string());
        }
        if self.cache_entries == 0 {
            return Err("cache_entries must be greater than 0".to_string());
        }
        if let Some(host) = &self.cache_host {
            if host.trim().is_empty() {
                return Err("cache_host must not be empty when set".to_string());
            }
            if self.cache_port == 0 {
                return Err(
                    "cache_port must be greater than 0 when a cache host is set".to_string()
                );
            }
        }

        if self.tile_size == 0 {
            return Err("tile_size must be greater than 0".to_string());
        }
        if self.clahe_grid == 0 {
            return Err("clahe_grid must be greater than 0".to_string());
        }
        if !self.clahe_clip_limit.is_finite() || self.clahe_clip_limit <= 0.0 {
            return Err("clahe_clip_limit must be a positive number".to_string());
        }

        if self.read_timeout_ms == 0 {
            return Err("read_timeout_ms must be greater than 0".to_string());
        }
        if self.nodata.is_some_and(|v| !v.is_finite()) {
            return Err("nodata must be a finite number".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Asset reader honoring the root, nodata and timeout settings.
    pub fn asset_reader(&self) -> WorldFileReader {
        let mut reader = WorldFileReader::new().with_timeout(self.read_timeout());
        if let Some(root) = &self.asset_root {
            reader = reader.with_root(root);
        }
        if let Some(nodata) = self.nodata {
            reader = reader.with_nodata(nodata);
        }
        reader
    }
}

// =============================================================================
// Tests
// =============================================================================
