use async_trait::async_trait;

use crate::error::ReadError;

use super::tile::{BoundingBox, ImageTile};

/// Trait for reading a geographic part of a source raster.
///
/// This is the seam to the raster decoder. The statistics provider uses it
/// for full-resolution region reads and the HTTP layer uses it to decode the
/// tile an algorithm runs on. Implementations must be thread-safe and must
/// release any opened handle before returning, on success and on failure.
#[async_trait]
pub trait AssetReader: Send + Sync {
    /// Read the pixels of `asset` covering `bbox`, widened by `padding`
    /// pixels on every side.
    ///
    /// The returned tile lists `asset` as its only asset. Nodata pixels,
    /// including padding that falls outside the raster, are non-finite and
    /// flagged in the mask.
    async fn part(
        &self,
        asset: &str,
        bbox: &BoundingBox,
        padding: usize,
    ) -> Result<ImageTile, ReadError>;
}
