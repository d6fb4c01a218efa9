//! Tile post-processing algorithms.
//!
//! The building blocks are plain functions over [`ImageTile`](crate::raster::ImageTile):
//!
//! - [`rescale`]: linear remap of band ranges to 0-255
//! - [`derive_mask`] / [`apply_mask`]: nodata mask propagation
//! - [`crop_to_tile`]: overscan removal
//! - [`equalize`] / [`adaptive_equalize`]: histogram remaps of 8-bit bands
//!
//! [`TileProcessor`] composes them into the registered [`Algorithm`]s.

mod crop;
mod equalize;
mod mask;
mod params;
mod processor;
mod registry;
mod rescale;

pub use crop::{check_buffer, crop_to_tile};
pub use equalize::{
    adaptive_equalize, equalize, DEFAULT_CLIP_LIMIT, DEFAULT_GRID, HISTOGRAM_BINS,
};
pub use mask::{apply_mask, derive_mask};
pub use params::{AlgorithmParameters, DEFAULT_BUFFER, DEFAULT_SCALE, DEFAULT_TILE_SIZE};
pub use processor::TileProcessor;
pub use registry::{Algorithm, AlgorithmInfo, AlgorithmRegistry};
pub use rescale::{rescale, rescale_value, DISPLAY_RANGE};
