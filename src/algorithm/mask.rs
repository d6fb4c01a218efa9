//! Nodata mask derivation and application.
//!
//! A pixel is invalid when the decoder already flagged it, or when any band
//! holds a non-finite sample at that position.

use ndarray::{Array2, Axis, Zip};

use crate::error::ProcessError;
use crate::raster::ImageTile;

/// Validity mask of `tile` (`true = invalid`).
pub fn derive_mask(tile: &ImageTile) -> Array2<bool> {
    let mut mask = tile.mask().clone();
    for band in tile.data().axis_iter(Axis(0)) {
        Zip::from(&mut mask).and(&band).for_each(|invalid, &v| {
            *invalid |= !v.is_finite();
        });
    }
    mask
}

/// Zero every masked sample in all bands and attach `mask` to the tile.
pub fn apply_mask(mut tile: ImageTile, mask: Array2<bool>) -> Result<ImageTile, ProcessError> {
    let expected = (tile.height(), tile.width());
    if mask.dim() != expected {
        return Err(ProcessError::InvalidParameters(format!(
            "mask shape {:?} does not match pixel shape {:?}",
            mask.dim(),
            expected
        )));
    }

    for mut band in tile.data_mut().axis_iter_mut(Axis(0)) {
        Zip::from(&mut band).and(&mask).for_each(|v, &invalid| {
            if invalid {
                *v = 0.0;
            }
        });
    }

    tile.with_mask(mask)
}
