//! PNG tile encoder.
//!
//! Output tiles are 8-bit. A single-band tile becomes gray + alpha, a
//! three-band tile becomes RGBA; any other band count encodes band 1 only.
//! The alpha channel is the inverse of the published mask: opaque pixels are
//! valid, transparent pixels are nodata.

use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, GrayAlphaImage, ImageFormat, LumaA, Rgba, RgbaImage};

use crate::error::ProcessError;

use super::tile::ImageTile;

/// Content type of encoded tiles.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Encoder turning processed tiles into PNG bytes.
#[derive(Debug, Clone, Default)]
pub struct PngTileEncoder {}

impl PngTileEncoder {
    pub fn new() -> Self {
        Self {}
    }

    /// Encode a processed tile as PNG.
    ///
    /// Samples are rounded and clamped to `0..=255`; non-finite samples
    /// encode as 0 and are transparent.
    pub fn encode(&self, tile: &ImageTile) -> Result<Bytes, ProcessError> {
        let width = tile.width() as u32;
        let height = tile.height() as u32;
        if width == 0 || height == 0 || tile.band_count() == 0 {
            return Err(ProcessError::Encode("tile is empty".to_string()));
        }

        let data = tile.data();
        let mask = tile.mask_bytes();
        let alpha = |row: usize, col: usize| u8::MAX - mask[[row, col]];

        let img = if tile.band_count() == 3 {
            DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
                let (row, col) = (y as usize, x as usize);
                Rgba([
                    to_byte(data[[0, row, col]]),
                    to_byte(data[[1, row, col]]),
                    to_byte(data[[2, row, col]]),
                    alpha(row, col),
                ])
            }))
        } else {
            DynamicImage::ImageLumaA8(GrayAlphaImage::from_fn(width, height, |x, y| {
                let (row, col) = (y as usize, x as usize);
                LumaA([to_byte(data[[0, row, col]]), alpha(row, col)])
            }))
        };

        let mut output = Vec::new();
        img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .map_err(|e| ProcessError::Encode(e.to_string()))?;

        Ok(Bytes::from(output))
    }
}

/// Convert a display-range sample to a byte.
pub fn to_byte(value: f32) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 255.0) as u8
    } else {
        0
    }
}
