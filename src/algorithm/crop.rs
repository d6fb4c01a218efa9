//! Overscan removal.

use ndarray::s;

use crate::error::ProcessError;
use crate::raster::ImageTile;

/// Keep the central `tile_size x tile_size` region starting at
/// `(buffer, buffer)`, across all bands and the mask.
///
/// The transform is shifted to the new origin. CRS, bounds and assets are
/// carried over unchanged.
///
/// # Errors
///
/// `InvalidBuffer` when either spatial dimension is smaller than
/// `2 * buffer + tile_size`.
pub fn crop_to_tile(
    tile: &ImageTile,
    buffer: usize,
    tile_size: usize,
) -> Result<ImageTile, ProcessError> {
    check_buffer(tile.height(), tile.width(), buffer, tile_size)?;

    let end = buffer + tile_size;
    let data = tile.data().slice(s![.., buffer..end, buffer..end]).to_owned();
    let mask = tile.mask().slice(s![buffer..end, buffer..end]).to_owned();
    let transform = tile.transform().translate(buffer as f64, buffer as f64);

    tile.derive(data, mask, transform)
}

/// Check that a `height x width` grid holds `tile_size` plus `buffer` on
/// every side.
pub fn check_buffer(
    height: usize,
    width: usize,
    buffer: usize,
    tile_size: usize,
) -> Result<(), ProcessError> {
    if tile_size == 0 {
        return Err(ProcessError::InvalidParameters(
            "tile size must be positive".to_string(),
        ));
    }

    let fits = buffer
        .checked_mul(2)
        .and_then(|b| b.checked_add(tile_size))
        .is_some_and(|required| height >= required && width >= required);
    if !fits {
        return Err(ProcessError::InvalidBuffer {
            height,
            width,
            buffer,
            tile_size,
        });
    }
    Ok(())
}
