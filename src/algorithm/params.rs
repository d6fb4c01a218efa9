use serde::{Deserialize, Serialize};

use crate::error::ProcessError;
use crate::raster::BoundingBox;

/// Default overscan buffer in pixels.
pub const DEFAULT_BUFFER: usize = 512;

/// Default published tile size in pixels.
pub const DEFAULT_TILE_SIZE: usize = 256;

/// Default scale when the caller supplies none.
pub const DEFAULT_SCALE: u32 = 1;

/// Per-invocation algorithm configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmParameters {
    /// Region the statistics describe, in the source CRS
    pub bbox: Option<BoundingBox>,

    /// Zoom/resolution indicator selecting the statistics source
    pub scale: u32,

    /// Overscan margin around the published tile
    pub buffer: usize,

    /// Published tile edge
    pub tile_size: usize,

    /// CLAHE clip limit; the processor default applies when unset
    pub clip_limit: Option<f32>,

    /// CLAHE grid (tiles per side); the processor default applies when unset
    pub grid: Option<usize>,
}

impl Default for AlgorithmParameters {
    fn default() -> Self {
        Self {
            bbox: None,
            scale: DEFAULT_SCALE,
            buffer: DEFAULT_BUFFER,
            tile_size: DEFAULT_TILE_SIZE,
            clip_limit: None,
            grid: None,
        }
    }
}

impl AlgorithmParameters {
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Reject malformed parameters before any computation.
    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.tile_size == 0 {
            return Err(ProcessError::InvalidParameters(
                "tile size must be positive".to_string(),
            ));
        }
        if let Some(bbox) = &self.bbox {
            bbox.validate()?;
        }
        if let Some(clip) = self.clip_limit {
            if !clip.is_finite() || clip <= 0.0 {
                return Err(ProcessError::InvalidParameters(format!(
                    "clip limit must be positive, got {}",
                    clip
                )));
            }
        }
        if self.grid == Some(0) {
            return Err(ProcessError::InvalidParameters(
                "grid must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
