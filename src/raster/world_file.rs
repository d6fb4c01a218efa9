//! Asset reader for local rasters georeferenced by a world file.
//!
//! A world file is a six-line text sidecar (`.pgw`, `.tfw`, `.jgw` or `.wld`)
//! holding the affine transform in pixel-center convention:
//!
//! ```text
//! A  pixel size in x
//! D  rotation about y
//! B  rotation about x
//! E  pixel size in y (negative for north-up)
//! C  x of the center of the upper-left pixel
//! F  y of the center of the upper-left pixel
//! ```
//!
//! An optional `.prj` sidecar supplies the CRS identifier.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{Array2, Array3};
use tracing::debug;
use url::Url;

use crate::error::ReadError;

use super::reader::AssetReader;
use super::tile::{BoundingBox, GeoTransform, ImageTile};

/// CRS reported when an asset has no `.prj` sidecar.
pub const UNKNOWN_CRS: &str = "unknown";

/// Default timeout for a single part read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on the pixel count of a single part read.
const MAX_WINDOW_PIXELS: usize = 1 << 26;

/// Tolerance used when snapping fractional pixel edges to the grid.
const EDGE_EPSILON: f64 = 1e-9;

/// Decoded single-band raster with its validity mask.
struct Raster {
    width: usize,
    height: usize,
    samples: Vec<f32>,
    invalid: Vec<bool>,
}

/// Reads parts of local image files georeferenced by world files.
#[derive(Debug, Clone)]
pub struct WorldFileReader {
    root: Option<PathBuf>,
    nodata: Option<f32>,
    timeout: Duration,
}

impl WorldFileReader {
    pub fn new() -> Self {
        Self {
            root: None,
            nodata: None,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Resolve relative asset paths against `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Treat samples equal to `nodata` as missing.
    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Map an asset identifier (`file://` URL or path) to a filesystem path.
    pub fn resolve(&self, asset: &str) -> Result<PathBuf, ReadError> {
        if let Ok(url) = Url::parse(asset) {
            // Single-letter schemes are Windows drive letters, not URLs
            if url.scheme().len() > 1 {
                if url.scheme() != "file" {
                    return Err(ReadError::NotFound(format!(
                        "{} (unsupported scheme '{}')",
                        asset,
                        url.scheme()
                    )));
                }
                return url
                    .to_file_path()
                    .map_err(|_| ReadError::NotFound(asset.to_string()));
            }
        }

        let path = PathBuf::from(asset);
        match &self.root {
            Some(root) if path.is_relative() => Ok(root.join(path)),
            _ => Ok(path),
        }
    }
}

impl Default for WorldFileReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetReader for WorldFileReader {
    async fn part(
        &self,
        asset: &str,
        bbox: &BoundingBox,
        padding: usize,
    ) -> Result<ImageTile, ReadError> {
        let path = self.resolve(asset)?;
        let asset_id = asset.to_string();
        let bbox = *bbox;
        let nodata = self.nodata;

        debug!(asset = %asset, ?bbox, padding, "Reading asset part");

        let task = tokio::task::spawn_blocking(move || {
            read_part_blocking(&path, &asset_id, &bbox, padding, nodata)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ReadError::Io(join_err.to_string())),
            Err(_) => Err(ReadError::Timeout(asset.to_string())),
        }
    }
}

fn read_part_blocking(
    path: &Path,
    asset: &str,
    bbox: &BoundingBox,
    padding: usize,
    nodata: Option<f32>,
) -> Result<ImageTile, ReadError> {
    if !path.exists() {
        return Err(ReadError::NotFound(asset.to_string()));
    }

    let transform = read_world_file(path, asset)?;
    let crs = read_prj(path).unwrap_or_else(|| UNKNOWN_CRS.to_string());

    // The decoder owns the file handle only for the duration of this call
    let img = image::open(path).map_err(|e| ReadError::Decode(e.to_string()))?;
    let raster = decode_luma(img, nodata);

    let (col_start, row_start, cols, rows) =
        pixel_window(&transform, bbox, raster.width, raster.height, padding, asset)?;

    let mut data = Array3::from_elem((1, rows, cols), f32::NAN);
    let mut mask = Array2::from_elem((rows, cols), true);

    for r in 0..rows {
        let src_row = row_start + r as i64;
        if src_row < 0 || src_row >= raster.height as i64 {
            continue;
        }
        for c in 0..cols {
            let src_col = col_start + c as i64;
            if src_col < 0 || src_col >= raster.width as i64 {
                continue;
            }
            let idx = src_row as usize * raster.width + src_col as usize;
            if raster.invalid[idx] {
                continue;
            }
            data[[0, r, c]] = raster.samples[idx];
            mask[[r, c]] = false;
        }
    }

    let window_transform = transform.translate(col_start as f64, row_start as f64);
    ImageTile::new(data, window_transform, crs, *bbox, vec![asset.to_string()])
        .with_mask(mask)
        .map_err(|e| ReadError::Decode(e.to_string()))
}

/// Pixel window `(col_start, row_start, cols, rows)` covering `bbox`, widened
/// by `padding`.
///
/// Edges stay in `f64` until the window is known to fit the read limit, so
/// huge but finite bboxes are rejected instead of overflowing.
fn pixel_window(
    transform: &GeoTransform,
    bbox: &BoundingBox,
    width: usize,
    height: usize,
    padding: usize,
    asset: &str,
) -> Result<(i64, i64, usize, usize), ReadError> {
    let outside = || ReadError::OutsideRaster(asset.to_string());
    let corners = [
        (bbox.min_x, bbox.max_y),
        (bbox.max_x, bbox.max_y),
        (bbox.min_x, bbox.min_y),
        (bbox.max_x, bbox.min_y),
    ];

    let mut min_col = f64::INFINITY;
    let mut min_row = f64::INFINITY;
    let mut max_col = f64::NEG_INFINITY;
    let mut max_row = f64::NEG_INFINITY;
    for (x, y) in corners {
        let (col, row) = transform.inverse(x, y).ok_or_else(outside)?;
        min_col = min_col.min(col);
        min_row = min_row.min(row);
        max_col = max_col.max(col);
        max_row = max_row.max(row);
    }

    let col_start = (min_col + EDGE_EPSILON).floor();
    let row_start = (min_row + EDGE_EPSILON).floor();
    let col_end = (max_col - EDGE_EPSILON).ceil();
    let row_end = (max_row - EDGE_EPSILON).ceil();

    let misses = col_end <= 0.0
        || row_end <= 0.0
        || col_start >= width as f64
        || row_start >= height as f64
        || col_end <= col_start
        || row_end <= row_start;
    if misses {
        return Err(outside());
    }

    let pad = padding as f64;
    let cols = col_end - col_start + 2.0 * pad;
    let rows = row_end - row_start + 2.0 * pad;
    // Negated so a NaN extent is rejected too
    if !(cols * rows <= MAX_WINDOW_PIXELS as f64) {
        return Err(ReadError::Decode(format!(
            "window of {:.0}x{:.0} pixels exceeds the read limit",
            cols, rows
        )));
    }

    Ok((
        (col_start - pad) as i64,
        (row_start - pad) as i64,
        cols as usize,
        rows as usize,
    ))
}

/// Reduce a decoded image to one band of raw sample values.
///
/// Integer images keep their native values (no normalization); an alpha
/// channel of zero marks the pixel invalid.
fn decode_luma(img: DynamicImage, nodata: Option<f32>) -> Raster {
    let width = img.width() as usize;
    let height = img.height() as usize;

    let (samples, alpha): (Vec<f32>, Option<Vec<bool>>) = match img {
        DynamicImage::ImageLuma8(buf) => (buf.into_raw().into_iter().map(f32::from).collect(), None),
        DynamicImage::ImageLuma16(buf) => {
            (buf.into_raw().into_iter().map(f32::from).collect(), None)
        }
        DynamicImage::ImageLumaA8(buf) => {
            let raw = buf.into_raw();
            (
                raw.chunks_exact(2).map(|p| f32::from(p[0])).collect(),
                Some(raw.chunks_exact(2).map(|p| p[1] == 0).collect()),
            )
        }
        DynamicImage::ImageLumaA16(buf) => {
            let raw = buf.into_raw();
            (
                raw.chunks_exact(2).map(|p| f32::from(p[0])).collect(),
                Some(raw.chunks_exact(2).map(|p| p[1] == 0).collect()),
            )
        }
        float @ (DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)) => {
            (float.to_luma32f().into_raw(), None)
        }
        other => (
            other.to_luma8().into_raw().into_iter().map(f32::from).collect(),
            None,
        ),
    };

    let invalid = samples
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            !v.is_finite()
                || nodata.is_some_and(|nd| v == nd)
                || alpha.as_ref().is_some_and(|a| a[i])
        })
        .collect::<Vec<_>>();

    let samples = samples
        .into_iter()
        .zip(&invalid)
        .map(|(v, &bad)| if bad { f32::NAN } else { v })
        .collect();

    Raster {
        width,
        height,
        samples,
        invalid,
    }
}

/// Candidate sidecar paths for an image, most specific first.
fn world_file_candidates(path: &Path) -> Vec<PathBuf> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut candidates = Vec::new();
    let specific = match ext.as_str() {
        "png" => Some("pgw"),
        "tif" | "tiff" => Some("tfw"),
        "jpg" | "jpeg" => Some("jgw"),
        _ => None,
    };
    if let Some(world_ext) = specific {
        candidates.push(path.with_extension(world_ext));
    }
    candidates.push(path.with_extension("wld"));
    candidates
}

fn read_world_file(path: &Path, asset: &str) -> Result<GeoTransform, ReadError> {
    let world_path = world_file_candidates(path)
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| ReadError::WorldFile {
            asset: asset.to_string(),
            message: "no world file found".to_string(),
        })?;

    let contents = std::fs::read_to_string(&world_path).map_err(|e| ReadError::WorldFile {
        asset: asset.to_string(),
        message: e.to_string(),
    })?;

    parse_world_file(&contents).map_err(|message| ReadError::WorldFile {
        asset: asset.to_string(),
        message,
    })
}

/// Parse world file contents into a corner-based [`GeoTransform`].
pub fn parse_world_file(contents: &str) -> Result<GeoTransform, String> {
    let values = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.parse::<f64>().map_err(|e| format!("'{}': {}", l, e)))
        .collect::<Result<Vec<_>, _>>()?;

    let [a, d, b, e, c, f] = values.as_slice() else {
        return Err(format!("expected 6 values, got {}", values.len()));
    };

    // Shift from the center of the upper-left pixel to its outer corner
    let corner_x = c - 0.5 * a - 0.5 * b;
    let corner_y = f - 0.5 * d - 0.5 * e;
    Ok(GeoTransform::new(*a, *b, corner_x, *d, *e, corner_y))
}

fn read_prj(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path.with_extension("prj")).ok()?;
    let trimmed = contents.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// =============================================================================
// Tests
// =============================================================================
