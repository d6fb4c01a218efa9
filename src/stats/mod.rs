//! Band statistics and their TTL cache.
//!
//! - [`BandStatistics`]: per-band min/max
//! - [`StatsCacheKey`]: stable key derived from asset and bounding box
//! - [`StatsStore`]: `GET` / `SET ... EX` capability, in memory or over RESP
//! - [`StatsCache`]: fail-open memoization with a fixed TTL
//! - [`RegionStatsProvider`]: chooses between tile statistics and a cached
//!   full-resolution region read depending on scale

mod band;
mod cache;
mod key;
mod provider;
mod resp;
mod store;

pub use band::BandStatistics;
pub use cache::{StatsCache, DEFAULT_STATS_TTL};
pub use key::{StatsCacheKey, STATS_KEY_PREFIX};
pub use provider::{RegionStatsProvider, DEFAULT_SCALE_THRESHOLD};
pub use resp::{RespStatsStore, DEFAULT_CACHE_TIMEOUT};
pub use store::{MemoryStatsStore, StatsStore, DEFAULT_MEMORY_STORE_ENTRIES};
