//! Histogram equalization of 8-bit bands.
//!
//! Two variants:
//!
//! 1. Global: one 256-bin histogram over the whole band, remapped through its
//!    cumulative distribution.
//! 2. Adaptive (CLAHE): the band is split into a grid of tiles, each tile
//!    gets its own clipped histogram and lookup table, and every pixel is
//!    bilinearly interpolated between the tables of the four nearest tile
//!    centers.
//!
//! Both remaps are monotonic per lookup table, so relative ordering within a
//! tile is preserved.

use ndarray::Array2;

/// Number of histogram bins for 8-bit data.
pub const HISTOGRAM_BINS: usize = 256;

/// Default CLAHE clip limit, as a multiple of the uniform bin height.
pub const DEFAULT_CLIP_LIMIT: f32 = 2.0;

/// Default CLAHE grid (tiles per side).
pub const DEFAULT_GRID: usize = 3;

type Histogram = [u32; HISTOGRAM_BINS];
type Lut = [u8; HISTOGRAM_BINS];

// =============================================================================
// Global Equalization
// =============================================================================

/// Equalize `pixels` through the cumulative histogram of its valid pixels.
///
/// When `mask` is given, invalid pixels (`true`) are left out of the
/// histogram but still remapped.
pub fn equalize(pixels: &Array2<u8>, mask: Option<&Array2<bool>>) -> Array2<u8> {
    let mut hist = [0u32; HISTOGRAM_BINS];
    let mut total = 0usize;

    match mask {
        Some(mask) if mask.dim() == pixels.dim() => {
            for (&v, &invalid) in pixels.iter().zip(mask.iter()) {
                if !invalid {
                    hist[v as usize] += 1;
                    total += 1;
                }
            }
        }
        _ => {
            for &v in pixels.iter() {
                hist[v as usize] += 1;
            }
            total = pixels.len();
        }
    }

    let lut = build_lut(&hist, total);
    pixels.mapv(|v| lut[v as usize])
}

/// Lookup table from a histogram: `round((cdf(v) - cdf_min) / (n - cdf_min) * 255)`.
fn build_lut(hist: &Histogram, total: usize) -> Lut {
    let mut cdf = [0u32; HISTOGRAM_BINS];
    let mut running = 0u32;
    for (slot, &count) in cdf.iter_mut().zip(hist.iter()) {
        running += count;
        *slot = running;
    }

    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);

    let mut lut = [0u8; HISTOGRAM_BINS];
    let denom = total as f64 - f64::from(cdf_min);
    if denom <= 0.0 {
        // Constant input
        return lut;
    }

    for (slot, &c) in lut.iter_mut().zip(cdf.iter()) {
        let val = (f64::from(c) - f64::from(cdf_min)) / denom * 255.0;
        *slot = val.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

// =============================================================================
// Adaptive Equalization (CLAHE)
// =============================================================================

/// Contrast-limited adaptive equalization over a `grid = (rows, cols)` of tiles.
///
/// `clip_limit` is a multiple of the uniform bin height (`tile_pixels / 256`);
/// a non-positive limit disables clipping. The grid is clamped to the image
/// dimensions.
pub fn adaptive_equalize(pixels: &Array2<u8>, clip_limit: f32, grid: (usize, usize)) -> Array2<u8> {
    let (h, w) = pixels.dim();
    if h == 0 || w == 0 {
        return pixels.clone();
    }

    let rows = grid.0.clamp(1, h);
    let cols = grid.1.clamp(1, w);
    let tile_h = h.div_ceil(rows);
    let tile_w = w.div_ceil(cols);
    // Rounding up the tile size may leave trailing grid cells empty
    let rows = h.div_ceil(tile_h);
    let cols = w.div_ceil(tile_w);

    let mut luts = Vec::with_capacity(rows * cols);
    for ty in 0..rows {
        for tx in 0..cols {
            let y0 = ty * tile_h;
            let x0 = tx * tile_w;
            let y1 = (y0 + tile_h).min(h);
            let x1 = (x0 + tile_w).min(w);
            let tile_pixels = (y1 - y0) * (x1 - x0);

            let mut hist = [0u32; HISTOGRAM_BINS];
            for &v in pixels.slice(ndarray::s![y0..y1, x0..x1]).iter() {
                hist[v as usize] += 1;
            }
            if clip_limit > 0.0 {
                clip_histogram(&mut hist, tile_pixels, clip_limit);
            }
            luts.push(build_lut(&hist, tile_pixels));
        }
    }

    let neighbours = |pos: usize, tile: usize, count: usize| -> (usize, usize, f32) {
        // Position relative to tile centers
        let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
        let i0 = (f.floor().max(0.0) as usize).min(count - 1);
        let i1 = (i0 + 1).min(count - 1);
        let weight = if i0 == i1 {
            0.0
        } else {
            (f - i0 as f32).clamp(0.0, 1.0)
        };
        (i0, i1, weight)
    };

    Array2::from_shape_fn((h, w), |(y, x)| {
        let (ty0, ty1, ay) = neighbours(y, tile_h, rows);
        let (tx0, tx1, ax) = neighbours(x, tile_w, cols);
        let v = pixels[[y, x]] as usize;

        let v00 = f32::from(luts[ty0 * cols + tx0][v]);
        let v01 = f32::from(luts[ty0 * cols + tx1][v]);
        let v10 = f32::from(luts[ty1 * cols + tx0][v]);
        let v11 = f32::from(luts[ty1 * cols + tx1][v]);

        let val = v00 * (1.0 - ax) * (1.0 - ay)
            + v01 * ax * (1.0 - ay)
            + v10 * (1.0 - ax) * ay
            + v11 * ax * ay;
        val.round().clamp(0.0, 255.0) as u8
    })
}

/// Clip bins above the limit and spread the excess evenly over all bins.
fn clip_histogram(hist: &mut Histogram, tile_pixels: usize, clip_limit: f32) {
    let clip = ((tile_pixels as f32 / HISTOGRAM_BINS as f32) * clip_limit)
        .ceil()
        .max(1.0) as u32;

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let per_bin = excess / HISTOGRAM_BINS as u32;
    let remainder = (excess % HISTOGRAM_BINS as u32) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += per_bin;
        if i < remainder {
            *bin += 1;
        }
    }
}
