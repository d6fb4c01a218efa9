use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::error::ProcessError;
use crate::raster::ImageTile;

/// Value range of one band.
///
/// Invariant: `min <= max` and both are finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    /// Number of valid samples the range was computed over
    #[serde(default)]
    pub count: u64,
}

impl BandStatistics {
    /// Create statistics from an explicit range.
    pub fn new(min: f64, max: f64) -> Result<Self, ProcessError> {
        let stats = Self { min, max, count: 0 };
        stats.validate()?;
        Ok(stats)
    }

    pub fn validate(&self) -> Result<(), ProcessError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(ProcessError::data_unavailable(format!(
                "non-finite statistics ({}, {})",
                self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(ProcessError::data_unavailable(format!(
                "inverted statistics ({}, {})",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Width of the range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Compute per-band statistics over the valid pixels of a tile.
    ///
    /// A pixel is skipped when the mask flags it or the sample is
    /// non-finite. A band with no valid sample fails with `DataUnavailable`.
    pub fn from_tile(tile: &ImageTile) -> Result<Vec<BandStatistics>, ProcessError> {
        if tile.band_count() == 0 || tile.height() == 0 || tile.width() == 0 {
            return Err(ProcessError::data_unavailable("tile has no pixels"));
        }

        let mask = tile.mask();
        tile.data()
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(band, samples)| {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                let mut count = 0u64;

                for (&v, &invalid) in samples.iter().zip(mask.iter()) {
                    if invalid || !v.is_finite() {
                        continue;
                    }
                    let v = f64::from(v);
                    min = min.min(v);
                    max = max.max(v);
                    count += 1;
                }

                if count == 0 {
                    return Err(ProcessError::data_unavailable(format!(
                        "band {} has no valid pixels",
                        band + 1
                    )));
                }
                Ok(BandStatistics { min, max, count })
            })
            .collect()
    }
}
