//! Cache keys for region statistics.
//!
//! The key is derived from the asset identifier and the bounding box. Each
//! coordinate is normalized before hashing so that equivalent float spellings
//! of the same bbox (`1`, `1.0`, `1.0000000000000002`, `-0.0`) hit the same
//! entry.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::raster::BoundingBox;

/// Prefix of every key written to the statistics store.
pub const STATS_KEY_PREFIX: &str = "stats:";

/// Decimal places kept per coordinate (sub-millimetre in metres and degrees).
const COORD_PRECISION: usize = 9;

/// Key identifying statistics of one asset over one bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatsCacheKey {
    asset: String,
    bbox: String,
}

impl StatsCacheKey {
    pub fn new(asset: impl Into<String>, bbox: &BoundingBox) -> Self {
        let bbox = bbox
            .as_array()
            .iter()
            .map(|&v| canonical_coord(v))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            asset: asset.into(),
            bbox,
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// Canonical `min_x,min_y,max_x,max_y` string.
    pub fn bbox(&self) -> &str {
        &self.bbox
    }

    /// Fixed-length key for the store: prefix plus SHA-256 of asset and bbox.
    pub fn store_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.asset.as_bytes());
        hasher.update(b"|");
        hasher.update(self.bbox.as_bytes());
        format!("{}{}", STATS_KEY_PREFIX, hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for StatsCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.asset, self.bbox)
    }
}

fn canonical_coord(v: f64) -> String {
    let s = format!("{:.*}", COORD_PRECISION, v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
