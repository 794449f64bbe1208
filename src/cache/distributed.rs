//! Distributed Cache Module
//!
//! Adapter over an optional external key-value store. Every store call returns
//! a `BackendResult`; the adapter inspects it once, logs failures, and degrades
//! the call to a miss or a `false` outcome so callers never see an error.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::{error, info, warn};

use crate::cache::local::effective_ttl;
use crate::cache::pattern::escape as escape_glob;
use crate::cache::redis_store::RedisStore;
use crate::cache::CacheStats;
use crate::error::{BackendError, BackendResult};

// == Remote Store Port ==
/// Minimal command set the adapter needs from an external store.
///
/// Keys passed in are already namespaced.
pub trait RemoteStore: Send + Sync {
    /// Handshake used once at construction.
    fn ping(&self) -> BackendResult<()>;

    /// Fetches the textual value stored under `key`.
    fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Stores `value` under `key` expiring after `ttl_secs`.
    fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> BackendResult<()>;

    /// Deletes the given keys, returning how many existed.
    fn del(&self, keys: &[String]) -> BackendResult<usize>;

    /// Lists every key matching the glob `pattern`.
    fn scan_match(&self, pattern: &str) -> BackendResult<Vec<String>>;
}

// == Distributed Cache Adapter ==
/// Namespaced, JSON-serializing view of a `RemoteStore`.
///
/// The connected flag is decided by the handshake at construction and never
/// changes afterwards; a failing call only affects its own result.
pub struct DistributedCacheAdapter {
    store: Option<Box<dyn RemoteStore>>,
    connected: bool,
    key_prefix: String,
    default_ttl: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for DistributedCacheAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedCacheAdapter")
            .field("connected", &self.connected)
            .field("key_prefix", &self.key_prefix)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl DistributedCacheAdapter {
    // == Constructors ==
    /// Opens a Redis connection at `url` and performs the handshake.
    ///
    /// A failure leaves the adapter permanently disconnected; it is logged,
    /// never returned.
    pub fn connect(url: &str, key_prefix: impl Into<String>, default_ttl: u64) -> Self {
        match RedisStore::open(url) {
            Ok(store) => Self::with_store(Box::new(store), key_prefix, default_ttl),
            Err(e) => {
                warn!(error = %e, "Distributed cache connection failed, using in-memory cache");
                Self::disconnected(key_prefix, default_ttl)
            }
        }
    }

    /// Wraps an already constructed store, running the handshake against it.
    pub fn with_store(
        store: Box<dyn RemoteStore>,
        key_prefix: impl Into<String>,
        default_ttl: u64,
    ) -> Self {
        let connected = match store.ping() {
            Ok(()) => {
                info!("Distributed cache connected successfully");
                true
            }
            Err(e) => {
                warn!(error = %e, "Distributed cache handshake failed, using in-memory cache");
                false
            }
        };

        Self {
            store: Some(store),
            connected,
            key_prefix: key_prefix.into(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn disconnected(key_prefix: impl Into<String>, default_ttl: u64) -> Self {
        Self {
            store: None,
            connected: false,
            key_prefix: key_prefix.into(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// True when the handshake succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected && self.store.is_some()
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn live_store(&self) -> Option<&dyn RemoteStore> {
        if self.connected {
            self.store.as_deref()
        } else {
            None
        }
    }

    // == Get ==
    /// Reads and deserializes a value. Errors count as misses.
    pub fn get(&self, key: &str) -> Option<Value> {
        let store = self.live_store()?;

        let fetched = store
            .get(&self.namespaced(key))
            .and_then(|raw| match raw {
                Some(text) => Ok(Some(serde_json::from_str::<Value>(&text)?)),
                None => Ok(None),
            });

        match fetched {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                error!(key, error = %e, "Distributed cache get failed");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    // == Set ==
    /// Serializes and stores a value. Returns false on any failure.
    pub fn set(&self, key: &str, value: &Value, ttl: Option<u64>) -> bool {
        let Some(store) = self.live_store() else {
            return false;
        };
        let ttl = effective_ttl(ttl, self.default_ttl);

        let written = serde_json::to_string(value)
            .map_err(BackendError::from)
            .and_then(|text| store.set_ex(&self.namespaced(key), &text, ttl));

        match written {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "Distributed cache set failed");
                false
            }
        }
    }

    // == Delete ==
    /// Deletes a key. Returns true iff it existed.
    pub fn delete(&self, key: &str) -> bool {
        let Some(store) = self.live_store() else {
            return false;
        };

        match store.del(&[self.namespaced(key)]) {
            Ok(removed) => removed > 0,
            Err(e) => {
                error!(key, error = %e, "Distributed cache delete failed");
                false
            }
        }
    }

    // == Clear ==
    /// Deletes every key in this namespace matching `pattern`.
    ///
    /// Returns the number of keys removed, 0 on failure.
    pub fn clear(&self, pattern: &str) -> usize {
        let Some(store) = self.live_store() else {
            return 0;
        };

        let scoped = format!("{}{}", escape_glob(&self.key_prefix), pattern);
        let removed = store
            .scan_match(&scoped)
            .and_then(|keys| if keys.is_empty() { Ok(0) } else { store.del(&keys) });

        match removed {
            Ok(count) => {
                info!(pattern, removed = count, "Distributed cache cleared");
                count
            }
            Err(e) => {
                error!(pattern, error = %e, "Distributed cache clear failed");
                0
            }
        }
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        CacheStats::distributed(
            self.is_connected(),
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeStore;
    use super::*;
    use serde_json::json;

    fn adapter(store: &FakeStore) -> DistributedCacheAdapter {
        DistributedCacheAdapter::with_store(Box::new(store.clone()), "app:", 300)
    }

    #[test]
    fn test_handshake_success_marks_connected() {
        let store = FakeStore::default();
        assert!(adapter(&store).is_connected());
    }

    #[test]
    fn test_handshake_failure_is_sticky() {
        let store = FakeStore::unreachable();
        let cache = adapter(&store);

        assert!(!cache.is_connected());
        store.refuse_ping.store(false, std::sync::atomic::Ordering::SeqCst);
        assert!(!cache.is_connected());
        assert!(!cache.set("k", &json!(1), None));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_connect_to_unreachable_url_degrades() {
        let cache = DistributedCacheAdapter::connect("redis://127.0.0.1:1/", "app:", 300);
        assert!(!cache.is_connected());
        assert_eq!(cache.get("anything"), None);
        assert_eq!(cache.clear("*"), 0);
    }

    #[test]
    fn test_keys_are_namespaced_and_serialized() {
        let store = FakeStore::default();
        let cache = adapter(&store);

        assert!(cache.set("user:1", &json!({"name": "Ada"}), Some(60)));

        let data = store.data.lock();
        let (raw, ttl) = data.get("app:user:1").expect("namespaced key");
        assert_eq!(serde_json::from_str::<Value>(raw).unwrap(), json!({"name": "Ada"}));
        assert_eq!(*ttl, 60);
    }

    #[test]
    fn test_default_ttl_applied() {
        let store = FakeStore::default();
        let cache = adapter(&store);

        cache.set("k", &json!(1), None);
        cache.set("z", &json!(1), Some(0));
        assert_eq!(store.data.lock()["app:k"].1, 300);
        assert_eq!(store.data.lock()["app:z"].1, 300);
    }

    #[test]
    fn test_get_counts_hits_and_misses() {
        let store = FakeStore::default();
        let cache = adapter(&store);

        cache.set("k", &json!([1, 2]), None);
        assert_eq!(cache.get("k"), Some(json!([1, 2])));
        assert_eq!(cache.get("missing"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.connected);
    }

    #[test]
    fn test_transient_failure_degrades_single_call() {
        let store = FakeStore::default();
        let cache = adapter(&store);
        cache.set("k", &json!(1), None);

        store.fail_calls(true);
        assert_eq!(cache.get("k"), None);
        assert!(!cache.set("k", &json!(2), None));
        assert!(!cache.delete("k"));
        assert_eq!(cache.clear("*"), 0);
        assert!(cache.is_connected(), "Connected flag is sticky");

        store.fail_calls(false);
        assert_eq!(cache.get("k"), Some(json!(1)));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_corrupted_value_is_a_miss() {
        let store = FakeStore::default();
        let cache = adapter(&store);
        store
            .data
            .lock()
            .insert("app:bad".to_string(), ("{not json".to_string(), 10));

        assert_eq!(cache.get("bad"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_delete_reports_existence() {
        let store = FakeStore::default();
        let cache = adapter(&store);

        cache.set("k", &json!(1), None);
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
    }

    #[test]
    fn test_clear_only_touches_own_namespace() {
        let store = FakeStore::default();
        let cache = adapter(&store);
        cache.set("user:1", &json!(1), None);
        cache.set("user:2", &json!(2), None);
        cache.set("post:1", &json!(3), None);
        store
            .data
            .lock()
            .insert("other-tenant:user:1".to_string(), ("1".to_string(), 10));

        assert_eq!(cache.clear("user:*"), 2);
        assert_eq!(cache.clear("*"), 1);
        assert!(store.data.lock().contains_key("other-tenant:user:1"));
    }

    #[test]
    fn test_clear_with_glob_characters_in_prefix() {
        let store = FakeStore::default();
        let cache = DistributedCacheAdapter::with_store(Box::new(store.clone()), "t*:", 300);
        cache.set("user:1", &json!(1), None);
        store
            .data
            .lock()
            .insert("tenant2:user:1".to_string(), ("1".to_string(), 10));

        assert_eq!(cache.clear("*"), 1);
        assert!(store.data.lock().contains_key("tenant2:user:1"));
        assert!(!store.data.lock().contains_key("t*:user:1"));
    }
}
