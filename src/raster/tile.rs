//! Decoded image tile and its georeferencing.
//!
//! # Conventions
//!
//! - Pixel data is band-major: `data[[band, row, col]]`.
//! - Nodata is any non-finite sample (NaN or infinite). Decoders convert their
//!   own sentinel to NaN before handing a tile over.
//! - `mask[[row, col]] == true` marks the pixel as **invalid**.
//! - The published byte mask ([`ImageTile::mask_bytes`]) uses
//!   `0 = valid, 255 = invalid`.

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ProcessError;
use crate::stats::BandStatistics;

/// Byte value marking an invalid pixel in the published mask.
pub const MASK_INVALID: u8 = 255;

/// Byte value marking a valid pixel in the published mask.
pub const MASK_VALID: u8 = 0;

// =============================================================================
// Bounding Box
// =============================================================================

/// Geographic bounding box `(min_x, min_y, max_x, max_y)` in the source CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a bounding box, rejecting non-finite or inverted coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, ProcessError> {
        let bbox = Self {
            min_x,
            min_y,
            max_x,
            max_y,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parse `"min_x,min_y,max_x,max_y"`.
    pub fn parse(s: &str) -> Result<Self, ProcessError> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProcessError::InvalidParameters(format!("bbox '{}': {}", s, e)))?;

        match values.as_slice() {
            [min_x, min_y, max_x, max_y] => Self::new(*min_x, *min_y, *max_x, *max_y),
            _ => Err(ProcessError::InvalidParameters(format!(
                "bbox '{}' must have exactly 4 coordinates, got {}",
                s,
                values.len()
            ))),
        }
    }

    /// Check that all coordinates are finite and `min < max` on both axes.
    pub fn validate(&self) -> Result<(), ProcessError> {
        let coords = [self.min_x, self.min_y, self.max_x, self.max_y];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(ProcessError::InvalidParameters(format!(
                "bbox has non-finite coordinates: {:?}",
                coords
            )));
        }
        if self.min_x >= self.max_x || self.min_y >= self.max_y {
            return Err(ProcessError::InvalidParameters(format!(
                "bbox min must be below max: {:?}",
                coords
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

// =============================================================================
// Geo Transform
// =============================================================================

/// Affine transform mapping pixel `(col, row)` to geographic `(x, y)`.
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform with the top-left corner at `(west, north)`.
    pub fn from_origin(west: f64, north: f64, x_res: f64, y_res: f64) -> Self {
        Self::new(x_res, 0.0, west, 0.0, -y_res, north)
    }

    /// Identity transform (pixel coordinates are geographic coordinates).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// Map a pixel corner to geographic coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Map geographic coordinates back to (fractional) pixel coordinates.
    ///
    /// Returns `None` for a degenerate (non-invertible) transform.
    pub fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let dx = x - self.c;
        let dy = y - self.f;
        Some((
            (self.e * dx - self.b * dy) / det,
            (self.a * dy - self.d * dx) / det,
        ))
    }

    /// Transform of the window whose top-left pixel is `(col, row)`.
    pub fn translate(&self, col: f64, row: f64) -> Self {
        let (c, f) = self.apply(col, row);
        Self { c, f, ..*self }
    }

    /// Geographic envelope of a `width` x `height` pixel grid.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(width as f64, 0.0),
            self.apply(0.0, height as f64),
            self.apply(width as f64, height as f64),
        ];
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

// =============================================================================
// Image Tile
// =============================================================================

/// A decoded raster tile: pixel data, validity mask and georeferencing.
#[derive(Debug, Clone)]
pub struct ImageTile {
    data: Array3<f32>,
    mask: Array2<bool>,
    transform: GeoTransform,
    crs: String,
    bounds: BoundingBox,
    assets: Vec<String>,
    dataset_statistics: Option<Vec<BandStatistics>>,
}

impl ImageTile {
    /// Create a tile with every pixel marked valid.
    pub fn new(
        data: Array3<f32>,
        transform: GeoTransform,
        crs: impl Into<String>,
        bounds: BoundingBox,
        assets: Vec<String>,
    ) -> Self {
        let (_, height, width) = data.dim();
        Self {
            data,
            mask: Array2::from_elem((height, width), false),
            transform,
            crs: crs.into(),
            bounds,
            assets,
            dataset_statistics: None,
        }
    }

    /// Attach a decoder-provided mask (`true = invalid`).
    pub fn with_mask(mut self, mask: Array2<bool>) -> Result<Self, ProcessError> {
        let expected = (self.height(), self.width());
        if mask.dim() != expected {
            return Err(ProcessError::InvalidParameters(format!(
                "mask shape {:?} does not match pixel shape {:?}",
                mask.dim(),
                expected
            )));
        }
        self.mask = mask;
        Ok(self)
    }

    /// Attach statistics the decoder computed over the whole dataset.
    pub fn with_dataset_statistics(mut self, stats: Vec<BandStatistics>) -> Self {
        self.dataset_statistics = Some(stats);
        self
    }

    /// Build a new tile from fresh pixels, copying this tile's CRS, bounds,
    /// assets and dataset statistics.
    pub fn derive(
        &self,
        data: Array3<f32>,
        mask: Array2<bool>,
        transform: GeoTransform,
    ) -> Result<Self, ProcessError> {
        let tile = Self {
            data,
            mask: Array2::from_elem((0, 0), false),
            transform,
            crs: self.crs.clone(),
            bounds: self.bounds,
            assets: self.assets.clone(),
            dataset_statistics: self.dataset_statistics.clone(),
        };
        tile.with_mask(mask)
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn dataset_statistics(&self) -> Option<&[BandStatistics]> {
        self.dataset_statistics.as_deref()
    }

    /// Published mask: `0 = valid, 255 = invalid`.
    pub fn mask_bytes(&self) -> Array2<u8> {
        self.mask
            .mapv(|invalid| if invalid { MASK_INVALID } else { MASK_VALID })
    }

    /// Number of pixels flagged invalid.
    pub fn invalid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

// =============================================================================
// Tests
// =============================================================================
