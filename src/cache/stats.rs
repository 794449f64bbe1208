//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

// == Backend Kind ==
/// Which backing store served the cache operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Shared external key-value store
    Redis,
    /// Process-local map
    InMemory,
}

// == Cache Stats ==
/// Read-only snapshot of cache performance metrics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Backing store kind
    pub backend: BackendKind,
    /// Whether the distributed store is connected (always false for in-memory)
    pub connected: bool,
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent, expired, or backend error)
    pub misses: u64,
    /// hits / (hits + misses), 0.0 before any request
    pub hit_rate: f64,
    /// Entries currently held (local backend only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    /// Capacity of the local map (local backend only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
    /// Entries evicted on overflow (local backend only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evictions: Option<u64>,
}

impl CacheStats {
    /// Snapshot for the distributed backend.
    pub fn distributed(connected: bool, hits: u64, misses: u64) -> Self {
        Self {
            backend: BackendKind::Redis,
            connected,
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            entries: None,
            max_entries: None,
            evictions: None,
        }
    }

    /// Snapshot for the local backend.
    pub fn local(counters: &HitCounters, entries: usize, max_entries: usize) -> Self {
        Self {
            backend: BackendKind::InMemory,
            connected: false,
            hits: counters.hits,
            misses: counters.misses,
            hit_rate: hit_rate(counters.hits, counters.misses),
            entries: Some(entries),
            max_entries: Some(max_entries),
            evictions: Some(counters.evictions),
        }
    }
}

// == Hit Counters ==
/// Mutable counters kept under the local cache lock.
#[derive(Debug, Clone, Default)]
pub struct HitCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl HitCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

// == Hit Rate ==
/// Returns hits / (hits + misses), or 0.0 if no requests have been made.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
