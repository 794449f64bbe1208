//! Cache Module
//!
//! Hybrid cache: a distributed store when one is reachable, otherwise an
//! in-memory map with lazy TTL expiration and soonest-expiry eviction.

mod distributed;
mod entry;
mod hybrid;
mod key;
mod local;
pub mod pattern;
mod redis_store;
mod stats;


// Re-export public types
pub use distributed::{DistributedCacheAdapter, RemoteStore};
pub use entry::CacheEntry;
pub use hybrid::HybridCache;
pub use key::derive_key;
pub use local::KeyValueCache;
pub use redis_store::RedisStore;
pub use stats::{BackendKind, CacheStats, HitCounters};
