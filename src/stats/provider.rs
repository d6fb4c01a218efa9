//! Region statistics with a scale-dependent source.
//!
//! ```text
//!                 scale <= threshold                 scale > threshold
//!          ┌──────────────────────────────┐   ┌───────────────────────────────┐
//!          │ loaded tile                  │   │ StatsCache (asset, bbox)      │
//!          │  dataset statistics if the   │   │   hit  → cached statistics    │
//!          │  decoder supplied them, else │   │   miss → AssetReader::part    │
//!          │  min/max over tile pixels    │   │          → min/max → cache    │
//!          └──────────────────────────────┘   └───────────────────────────────┘
//! ```
//!
//! At low scale the loaded tile is already a cheap approximation of the
//! visible region. At high scale the exact region is read at full resolution,
//! which is expensive, so the result is cached.

use std::sync::Arc;

use tracing::debug;

use crate::algorithm::AlgorithmParameters;
use crate::error::ProcessError;
use crate::raster::{AssetReader, BoundingBox, ImageTile};

use super::band::BandStatistics;
use super::cache::StatsCache;
use super::key::StatsCacheKey;

/// Default scale above which statistics come from a region read.
pub const DEFAULT_SCALE_THRESHOLD: u32 = 8;

/// Computes or retrieves the statistics used to rescale a tile.
pub struct RegionStatsProvider<R: AssetReader> {
    reader: Arc<R>,
    cache: StatsCache,
    scale_threshold: u32,
}

impl<R: AssetReader> RegionStatsProvider<R> {
    pub fn new(reader: Arc<R>, cache: StatsCache, scale_threshold: u32) -> Self {
        Self {
            reader,
            cache,
            scale_threshold,
        }
    }

    pub fn scale_threshold(&self) -> u32 {
        self.scale_threshold
    }

    pub fn cache(&self) -> &StatsCache {
        &self.cache
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Statistics for rescaling `tile` under `params`.
    ///
    /// # Errors
    ///
    /// - `InvalidParameters` when a region read is needed but no bbox is given
    /// - `DataUnavailable` when the tile has no source asset, or the region
    ///   cannot be read or holds no valid pixel
    pub async fn statistics_for(
        &self,
        tile: &ImageTile,
        params: &AlgorithmParameters,
    ) -> Result<Vec<BandStatistics>, ProcessError> {
        if params.scale > self.scale_threshold {
            let bbox = params.bbox.ok_or_else(|| {
                ProcessError::InvalidParameters(format!(
                    "bbox is required when scale {} exceeds {}",
                    params.scale, self.scale_threshold
                ))
            })?;
            let asset = tile
                .assets()
                .first()
                .ok_or_else(|| ProcessError::data_unavailable("tile has no source asset"))?;

            return self.region_statistics(asset, &bbox).await;
        }

        debug!(
            scale = params.scale,
            threshold = self.scale_threshold,
            "Using loaded tile statistics"
        );
        match tile.dataset_statistics() {
            Some(stats) if stats.len() == tile.band_count() => Ok(stats.to_vec()),
            _ => BandStatistics::from_tile(tile),
        }
    }

    /// Statistics of `asset` over `bbox` at full resolution, through the cache.
    pub async fn region_statistics(
        &self,
        asset: &str,
        bbox: &BoundingBox,
    ) -> Result<Vec<BandStatistics>, ProcessError> {
        let key = StatsCacheKey::new(asset, bbox);
        if let Some(stats) = self.cache.get(&key).await {
            return Ok(stats);
        }

        debug!(key = %key, "Reading region for statistics");
        let region = self.reader.part(asset, bbox, 0).await.map_err(|e| {
            ProcessError::data_unavailable(format!("region of {} unreadable: {}", asset, e))
        })?;

        let stats = BandStatistics::from_tile(&region)?;
        self.cache.put(&key, &stats).await;
        Ok(stats)
    }
}
