//! Algorithm execution.
//!
//! ```text
//! histogram_equalize:  derive mask → own min/max → rescale → equalize → mask → crop
//! adaptive_equalize:   derive mask → own min/max → rescale → CLAHE    → mask → crop
//! bbox_rescale:        derive mask → provider stats → rescale          → mask → crop if buffered
//! ```
//!
//! Every variant takes the tile by value and returns a new tile that keeps
//! the input's CRS, bounds and assets. Geometry is checked before any
//! statistics are computed, so a bad buffer never costs a region read.

use std::sync::Arc;

use ndarray::{Array2, Axis};
use tracing::debug;

use crate::error::ProcessError;
use crate::raster::{to_byte, AssetReader, ImageTile};
use crate::stats::{BandStatistics, RegionStatsProvider};

use super::crop::{check_buffer, crop_to_tile};
use super::equalize::{adaptive_equalize, equalize, DEFAULT_CLIP_LIMIT, DEFAULT_GRID};
use super::mask::{apply_mask, derive_mask};
use super::params::AlgorithmParameters;
use super::registry::{Algorithm, AlgorithmRegistry};
use super::rescale::{rescale, DISPLAY_RANGE};

/// Runs registered algorithms against decoded tiles.
pub struct TileProcessor<R: AssetReader> {
    provider: RegionStatsProvider<R>,
    registry: AlgorithmRegistry,
    clip_limit: f32,
    grid: usize,
}

impl<R: AssetReader> TileProcessor<R> {
    pub fn new(provider: RegionStatsProvider<R>) -> Self {
        Self {
            provider,
            registry: AlgorithmRegistry::new(),
            clip_limit: DEFAULT_CLIP_LIMIT,
            grid: DEFAULT_GRID,
        }
    }

    /// Default CLAHE settings for requests that don't set their own.
    pub fn with_clahe(mut self, clip_limit: f32, grid: usize) -> Self {
        self.clip_limit = clip_limit;
        self.grid = grid;
        self
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &RegionStatsProvider<R> {
        &self.provider
    }

    pub fn reader(&self) -> &Arc<R> {
        self.provider.reader()
    }

    /// Resolve `name` and run it.
    pub async fn process(
        &self,
        name: &str,
        tile: ImageTile,
        params: &AlgorithmParameters,
    ) -> Result<ImageTile, ProcessError> {
        let algorithm = self.registry.get(name)?;
        self.run(algorithm, tile, params).await
    }

    /// Run one algorithm.
    pub async fn run(
        &self,
        algorithm: Algorithm,
        tile: ImageTile,
        params: &AlgorithmParameters,
    ) -> Result<ImageTile, ProcessError> {
        params.validate()?;
        if tile.band_count() != algorithm.input_nbands() {
            return Err(ProcessError::InvalidParameters(format!(
                "{} expects {} band(s), tile has {}",
                algorithm,
                algorithm.input_nbands(),
                tile.band_count()
            )));
        }

        let crop = algorithm.always_crops() || params.buffer > 0;
        if crop {
            check_buffer(tile.height(), tile.width(), params.buffer, params.tile_size)?;
        }

        debug!(
            algorithm = %algorithm,
            height = tile.height(),
            width = tile.width(),
            scale = params.scale,
            "Processing tile"
        );

        let processed = match algorithm {
            Algorithm::GlobalEqualize => {
                equalize_band(tile, |band, mask| equalize(band, Some(mask)))?
            }
            Algorithm::AdaptiveEqualize => {
                let clip_limit = params.clip_limit.unwrap_or(self.clip_limit);
                let grid = params.grid.unwrap_or(self.grid);
                equalize_band(tile, |band, _| {
                    adaptive_equalize(band, clip_limit, (grid, grid))
                })?
            }
            Algorithm::BBoxRescale => self.bbox_rescale(tile, params).await?,
        };

        if crop {
            crop_to_tile(&processed, params.buffer, params.tile_size)
        } else {
            Ok(processed)
        }
    }

    async fn bbox_rescale(
        &self,
        mut tile: ImageTile,
        params: &AlgorithmParameters,
    ) -> Result<ImageTile, ProcessError> {
        let mask = derive_mask(&tile);
        let stats = self.provider.statistics_for(&tile, params).await?;
        rescale(&mut tile, &stats, DISPLAY_RANGE)?;
        apply_mask(tile, mask)
    }
}

/// Normalize band 1 to bytes with its own range, remap it, and mask.
fn equalize_band<F>(mut tile: ImageTile, remap: F) -> Result<ImageTile, ProcessError>
where
    F: FnOnce(&Array2<u8>, &Array2<bool>) -> Array2<u8>,
{
    let mask = derive_mask(&tile);
    let stats = BandStatistics::from_tile(&tile)?;
    rescale(&mut tile, &stats, DISPLAY_RANGE)?;

    let bytes = tile.data().index_axis(Axis(0), 0).mapv(to_byte);
    let data = remap(&bytes, &mask).mapv(f32::from).insert_axis(Axis(0));

    let tile = tile.derive(data, mask.clone(), *tile.transform())?;
    apply_mask(tile, mask)
}
