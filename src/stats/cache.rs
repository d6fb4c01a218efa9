//! Fail-open statistics cache.
//!
//! Wraps a [`StatsStore`] with the serialization of [`BandStatistics`] and a
//! fixed time-to-live chosen at construction. Store failures never surface:
//! they are logged and the lookup behaves as a miss, so callers always fall
//! back to recomputing.
//!
//! There is no single-flight: concurrent misses for the same key may all
//! compute and all write. Statistics for a key are deterministic, so the last
//! write wins harmlessly.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::band::BandStatistics;
use super::key::StatsCacheKey;
use super::store::{MemoryStatsStore, StatsStore};

/// Default time-to-live of cached statistics (1 hour).
pub const DEFAULT_STATS_TTL: Duration = Duration::from_secs(3600);

/// TTL-keyed memoization of region statistics.
#[derive(Clone)]
pub struct StatsCache {
    store: Arc<dyn StatsStore>,
    ttl: Duration,
}

impl StatsCache {
    pub fn new(store: Arc<dyn StatsStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Cache backed by a fresh in-process store.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryStatsStore::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Look up statistics; `None` on a miss, an expired entry, an
    /// unreadable entry, or an unavailable store.
    pub async fn get(&self, key: &StatsCacheKey) -> Option<Vec<BandStatistics>> {
        let store_key = key.store_key();

        let raw = match self.store.get(&store_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "Statistics cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Statistics cache unavailable, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<Vec<BandStatistics>>(&raw) {
            Ok(stats) if !stats.is_empty() && stats.iter().all(|s| s.validate().is_ok()) => {
                debug!(key = %key, "Statistics cache hit");
                Some(stats)
            }
            Ok(_) => {
                warn!(key = %key, "Discarding invalid cached statistics");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cached statistics");
                None
            }
        }
    }

    /// Store statistics under `key` for the configured TTL.
    pub async fn put(&self, key: &StatsCacheKey, stats: &[BandStatistics]) {
        self.put_with_ttl(key, stats, self.ttl).await;
    }

    /// Store statistics with an explicit TTL. Failures are logged only.
    pub async fn put_with_ttl(&self, key: &StatsCacheKey, stats: &[BandStatistics], ttl: Duration) {
        let value = match serde_json::to_string(stats) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize statistics");
                return;
            }
        };

        match self.store.set(&key.store_key(), &value, ttl).await {
            Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "Cached statistics"),
            Err(e) => warn!(key = %key, error = %e, "Statistics cache unavailable, not caching"),
        }
    }
}
