//! Linear intensity rescale.
//!
//! Each sample is mapped from its band's statistical range onto the output
//! range and clipped:
//!
//! ```text
//! out = (v - in_min) / (in_max - in_min) * (out_max - out_min) + out_min
//! ```
//!
//! A band with `in_min == in_max` maps every finite sample to `out_min`.
//! Non-finite samples stay non-finite; they are nodata and the mask
//! propagator zeroes them.

use ndarray::Axis;

use crate::error::ProcessError;
use crate::raster::ImageTile;
use crate::stats::BandStatistics;

/// Output range of the display rescale.
pub const DISPLAY_RANGE: (f64, f64) = (0.0, 255.0);

/// Rescale every band of `tile` in place.
///
/// `ranges` holds one entry per band, or a single entry applied to all bands.
pub fn rescale(
    tile: &mut ImageTile,
    ranges: &[BandStatistics],
    out_range: (f64, f64),
) -> Result<(), ProcessError> {
    let (out_min, out_max) = out_range;
    if !out_min.is_finite() || !out_max.is_finite() || out_min > out_max {
        return Err(ProcessError::InvalidParameters(format!(
            "invalid output range ({}, {})",
            out_min, out_max
        )));
    }

    let bands = tile.band_count();
    if ranges.len() != 1 && ranges.len() != bands {
        return Err(ProcessError::InvalidParameters(format!(
            "{} statistics ranges for {} bands",
            ranges.len(),
            bands
        )));
    }
    for range in ranges {
        range.validate()?;
    }

    for (band, mut samples) in tile.data_mut().axis_iter_mut(Axis(0)).enumerate() {
        let range = if ranges.len() == 1 {
            &ranges[0]
        } else {
            &ranges[band]
        };
        samples.mapv_inplace(|v| rescale_value(v, range, out_range));
    }

    Ok(())
}

/// Rescale one sample. Computed in `f64` so `in_max` lands exactly on `out_max`.
pub fn rescale_value(value: f32, range: &BandStatistics, out_range: (f64, f64)) -> f32 {
    if !value.is_finite() {
        return value;
    }
    let (out_min, out_max) = out_range;
    let span = range.span();
    if span == 0.0 {
        return out_min as f32;
    }

    let scaled = (f64::from(value) - range.min) / span * (out_max - out_min) + out_min;
    scaled.clamp(out_min, out_max) as f32
}
