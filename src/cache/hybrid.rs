//! Hybrid Cache Module
//!
//! Routes every operation to the distributed adapter when it is connected and
//! to the local map otherwise. Both paths expose the same semantics, so callers
//! do not need to know which one is active.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{CacheStats, DistributedCacheAdapter, KeyValueCache};
use crate::config::Config;

/// The backend chosen at construction.
enum Backend<'a> {
    Distributed(&'a DistributedCacheAdapter),
    Local(&'a KeyValueCache),
}

// == Hybrid Cache ==
#[derive(Debug)]
pub struct HybridCache {
    distributed: Option<DistributedCacheAdapter>,
    local: KeyValueCache,
}

impl HybridCache {
    // == Constructors ==
    /// Creates a cache backed only by the local map.
    pub fn local(local: KeyValueCache) -> Self {
        info!("Using in-memory cache (local)");
        Self {
            distributed: None,
            local,
        }
    }

    /// Creates a cache preferring `distributed` when its handshake succeeded.
    pub fn with_distributed(distributed: DistributedCacheAdapter, local: KeyValueCache) -> Self {
        if distributed.is_connected() {
            info!("Using distributed cache");
        } else {
            info!("Using in-memory cache (local)");
        }
        Self {
            distributed: Some(distributed),
            local,
        }
    }

    /// Builds the cache from configuration, connecting to Redis when a URL is set.
    pub fn from_config(config: &Config) -> Self {
        let local = KeyValueCache::new(config.cache_max_entries, config.cache_default_ttl);

        match config.redis_url.as_deref() {
            Some(url) => Self::with_distributed(
                DistributedCacheAdapter::connect(
                    url,
                    config.cache_key_prefix.clone(),
                    config.cache_default_ttl,
                ),
                local,
            ),
            None => Self::local(local),
        }
    }

    /// True when operations are served by the distributed store.
    pub fn is_distributed(&self) -> bool {
        self.distributed
            .as_ref()
            .is_some_and(DistributedCacheAdapter::is_connected)
    }

    fn backend(&self) -> Backend<'_> {
        match &self.distributed {
            Some(remote) if remote.is_connected() => Backend::Distributed(remote),
            _ => Backend::Local(&self.local),
        }
    }

    // == Get ==
    /// Returns the cached value, or None on miss, expiry, or backend error.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.backend() {
            Backend::Distributed(remote) => remote.get(key),
            Backend::Local(local) => local.get(key),
        }
    }

    // == Set ==
    /// Stores a value for `ttl` seconds (None or 0 = default TTL).
    ///
    /// Returns false only when the distributed store rejected the write; the
    /// local path always succeeds.
    pub fn set(&self, key: &str, value: Value, ttl: Option<u64>) -> bool {
        match self.backend() {
            Backend::Distributed(remote) => remote.set(key, &value, ttl),
            Backend::Local(local) => {
                local.set(key, value, ttl);
                true
            }
        }
    }

    // == Delete ==
    /// Removes a key. Returns true iff an entry existed and was removed.
    pub fn delete(&self, key: &str) -> bool {
        match self.backend() {
            Backend::Distributed(remote) => remote.delete(key),
            Backend::Local(local) => local.delete(key),
        }
    }

    // == Clear ==
    /// Removes all entries whose key matches the glob `pattern` ("" means "*").
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self, pattern: &str) -> usize {
        let pattern = if pattern.is_empty() { "*" } else { pattern };
        match self.backend() {
            Backend::Distributed(remote) => remote.clear(pattern),
            Backend::Local(local) => local.clear(pattern),
        }
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        match self.backend() {
            Backend::Distributed(remote) => remote.stats(),
            Backend::Local(local) => local.stats(),
        }
    }

    // == Typed Access ==
    /// Reads a value and deserializes it into `T`.
    ///
    /// A value of the wrong shape is reported and treated as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Serializes `value` and stores it. Returns false if serialization fails.
    pub fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, value, ttl),
            Err(e) => {
                warn!(key, error = %e, "Value could not be serialized for caching");
                false
            }
        }
    }

    // == Memoize ==
    /// Returns the cached `T` under `key`, or runs `compute`, caches and returns
    /// its result.
    ///
    /// Pair with `cache::derive_key` to memoize a function call.
    pub fn get_or_compute<T, F>(&self, key: &str, ttl: Option<u64>, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(cached) = self.get_as(key) {
            return cached;
        }

        let fresh = compute();
        self.set_as(key, &fresh, ttl);
        fresh
    }
}
