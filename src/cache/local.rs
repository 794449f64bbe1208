//! Local Cache Module
//!
//! Process-local key-value map with lazy TTL expiration and soonest-expiry
//! eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::pattern::glob_match;
use crate::cache::{CacheEntry, CacheStats, HitCounters};
use crate::clock::{Clock, SystemClock};

/// State guarded by the single cache lock.
#[derive(Debug, Default)]
struct LocalState {
    entries: HashMap<String, CacheEntry>,
    counters: HitCounters,
}

// == Key Value Cache ==
/// Thread-safe in-memory cache.
///
/// Every operation runs under one mutex, so the check-evict-insert sequence of
/// `set` is observed atomically by concurrent callers.
#[derive(Debug)]
pub struct KeyValueCache {
    state: Mutex<LocalState>,
    max_entries: usize,
    default_ttl: u64,
    clock: Arc<dyn Clock>,
}

impl KeyValueCache {
    // == Constructor ==
    /// Creates a new cache with specified capacity and default TTL.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the cache can hold (at least 1)
    /// * `default_ttl` - Default TTL in seconds for entries without explicit TTL
    pub fn new(max_entries: usize, default_ttl: u64) -> Self {
        Self::with_clock(max_entries, default_ttl, SystemClock::shared())
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(max_entries: usize, default_ttl: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            max_entries: max_entries.max(1),
            default_ttl,
            clock,
        }
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are removed on access and counted as misses.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let value = entry.value.clone();
                state.counters.record_hit();
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.remove(key);
            debug!(key, "Lazily expired local cache entry");
        }
        state.counters.record_miss();
        None
    }

    // == Set ==
    /// Stores a key-value pair.
    ///
    /// If the key already exists the value is overwritten and its expiry reset.
    /// Inserting a new key into a full cache first evicts the entry whose expiry
    /// is soonest.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - TTL in seconds; None or 0 uses the default
    pub fn set(&self, key: &str, value: Value, ttl: Option<u64>) {
        let ttl = Duration::from_secs(effective_ttl(ttl, self.default_ttl));
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.entries.contains_key(key) && state.entries.len() >= self.max_entries {
            if let Some(victim) = soonest_expiring(&state.entries) {
                state.entries.remove(&victim);
                state.counters.record_eviction();
                debug!(key = %victim, "Evicted soonest-expiring local cache entry");
            }
        }

        state
            .entries
            .insert(key.to_string(), CacheEntry::new(value, now, ttl));
    }

    // == Delete ==
    /// Removes an entry by key. Returns true if it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.state.lock().entries.remove(key).is_some()
    }

    // == Clear ==
    /// Removes every entry whose key matches the glob `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self, pattern: &str) -> usize {
        let mut state = self.state.lock();
        let removed = if pattern == "*" {
            let count = state.entries.len();
            state.entries.clear();
            count
        } else {
            let before = state.entries.len();
            state.entries.retain(|key, _| !glob_match(pattern, key));
            before - state.entries.len()
        };

        info!(pattern, removed, "Local cache cleared");
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats::local(&state.counters, state.entries.len(), self.max_entries)
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

/// Resolves a caller TTL against the configured default.
pub(crate) fn effective_ttl(ttl: Option<u64>, default_ttl: u64) -> u64 {
    match ttl {
        Some(secs) if secs > 0 => secs,
        _ => default_ttl,
    }
}

/// Picks the key with the nearest expiry. Ties go to the smallest key so the
/// choice is deterministic.
fn soonest_expiring(entries: &HashMap<String, CacheEntry>) -> Option<String> {
    entries
        .iter()
        .min_by(|(ka, a), (kb, b)| a.expires_at.cmp(&b.expires_at).then_with(|| ka.cmp(kb)))
        .map(|(key, _)| key.clone())
}
