//! Raster model and the decoder seam.
//!
//! - [`ImageTile`]: decoded pixels, mask and georeferencing handed to algorithms
//! - [`AssetReader`]: reads a geographic part of a source asset
//! - [`WorldFileReader`]: local rasters georeferenced by world-file sidecars
//! - [`PngTileEncoder`]: encodes processed tiles for the HTTP layer

mod encoder;
mod reader;
mod tile;
mod world_file;

pub use encoder::{to_byte, PngTileEncoder, PNG_CONTENT_TYPE};
pub use reader::AssetReader;
pub use tile::{BoundingBox, GeoTransform, ImageTile, MASK_INVALID, MASK_VALID};
pub use world_file::{parse_world_file, WorldFileReader, DEFAULT_READ_TIMEOUT, UNKNOWN_CRS};
