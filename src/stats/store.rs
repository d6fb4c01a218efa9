//! Key-value stores backing the statistics cache.
//!
//! The cache only needs `GET key` and `SET key value EX seconds`. Two
//! implementations exist:
//!
//! - [`MemoryStatsStore`]: in-process LRU with per-entry expiry, used when no
//!   external store is configured and in tests
//! - [`RespStatsStore`](super::RespStatsStore): a remote store speaking RESP

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CacheError;

/// Default maximum number of entries held by the in-memory store.
pub const DEFAULT_MEMORY_STORE_ENTRIES: usize = 10_000;

/// String key-value store with per-entry time-to-live.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Fetch a value; `Ok(None)` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`, overwriting any previous one.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

// =============================================================================
// In-Memory Store
// =============================================================================

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process store with LRU bound and lazy expiry.
///
/// Expired entries are dropped when read, or evicted by LRU order once the
/// store is full.
pub struct MemoryStatsStore {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_STORE_ENTRIES)
    }

    /// Create a store bounded to `max_entries` (at least one).
    pub fn with_capacity(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl Default for MemoryStatsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.put(key.to_string(), entry);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
