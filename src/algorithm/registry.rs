//! Algorithm variants and the name lookup table.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::ProcessError;

/// The closed set of post-processing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Own-range rescale, global histogram equalization, crop
    GlobalEqualize,

    /// Own-range rescale, CLAHE, mask, crop
    AdaptiveEqualize,

    /// Rescale with tile or cached region statistics, mask, optional crop
    BBoxRescale,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::GlobalEqualize,
        Algorithm::AdaptiveEqualize,
        Algorithm::BBoxRescale,
    ];

    /// Name the algorithm is registered and requested under.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::GlobalEqualize => "histogram_equalize",
            Algorithm::AdaptiveEqualize => "adaptive_equalize",
            Algorithm::BBoxRescale => "bbox_rescale",
        }
    }

    /// Band count the algorithm accepts.
    pub fn input_nbands(&self) -> usize {
        1
    }

    pub fn output_nbands(&self) -> usize {
        1
    }

    /// Whether the overscan buffer is always cropped away.
    ///
    /// `BBoxRescale` only crops when the caller asks for a buffer.
    pub fn always_crops(&self) -> bool {
        !matches!(self, Algorithm::BBoxRescale)
    }

    /// Descriptive metadata for listings.
    pub fn info(&self) -> AlgorithmInfo {
        let (title, description, parameters): (&str, &str, &[&str]) = match self {
            Algorithm::GlobalEqualize => (
                "Histogram equalization",
                "Rescale band 1 to its own range, flatten its histogram over the \
                 buffered tile, then crop to the tile size.",
                &["buffer", "tilesize"],
            ),
            Algorithm::AdaptiveEqualize => (
                "Adaptive histogram equalization",
                "Rescale band 1 to its own range, apply contrast-limited adaptive \
                 equalization on a tile grid, mask nodata, then crop to the tile size.",
                &["buffer", "tilesize", "clip_limit", "grid"],
            ),
            Algorithm::BBoxRescale => (
                "Bounding box rescale",
                "Rescale to 0-255 using statistics of the loaded tile at low scale, \
                 or cached full-resolution statistics of the bbox at high scale.",
                &["bbox", "scale", "buffer", "tilesize"],
            ),
        };

        AlgorithmInfo {
            name: self.name(),
            title,
            description,
            input_nbands: self.input_nbands(),
            output_nbands: self.output_nbands(),
            output_dtype: "uint8",
            parameters: parameters.to_vec(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Algorithm metadata as served by the listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmInfo {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_nbands: usize,
    pub output_nbands: usize,
    pub output_dtype: &'static str,
    pub parameters: Vec<&'static str>,
}

/// Lookup table from algorithm name to variant, built once at startup.
#[derive(Debug, Clone)]
pub struct AlgorithmRegistry {
    by_name: HashMap<&'static str, Algorithm>,
}

impl AlgorithmRegistry {
    /// Registry holding every built-in algorithm.
    pub fn new() -> Self {
        let by_name = Algorithm::ALL.iter().map(|a| (a.name(), *a)).collect();
        Self { by_name }
    }

    /// Resolve a requested name.
    pub fn get(&self, name: &str) -> Result<Algorithm, ProcessError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ProcessError::UnknownAlgorithm(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Metadata of every algorithm, sorted by name.
    pub fn list(&self) -> Vec<AlgorithmInfo> {
        self.names()
            .into_iter()
            .filter_map(|name| self.by_name.get(name))
            .map(Algorithm::info)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::new()
    }
}
