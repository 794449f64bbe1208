//! Configuration Module
//!
//! Handles loading the cache, rate limiter, task queue and server knobs from
//! environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection string for the distributed cache, None = local cache only
    pub redis_url: Option<String>,
    /// Namespace prefix prepended to every key sent to the distributed store
    pub cache_key_prefix: String,
    /// Maximum number of entries the local cache can hold
    pub cache_max_entries: usize,
    /// Default TTL in seconds for cache entries without explicit TTL
    pub cache_default_ttl: u64,
    /// Default bucket capacity for the rate limiter
    pub rate_limit_capacity: f64,
    /// Default bucket refill rate in tokens per second
    pub rate_limit_refill_rate: f64,
    /// Buckets idle longer than this many seconds are swept
    pub bucket_max_age: u64,
    /// Number of task queue workers
    pub queue_workers: usize,
    /// Upper bound in seconds on waiting for workers at shutdown
    pub queue_shutdown_timeout: u64,
    /// Finished task records older than this many seconds are pruned
    pub task_retention: u64,
    /// Interval in seconds between housekeeping runs
    pub housekeeping_interval: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` / `KV_URL` - Distributed cache URL (default: none)
    /// - `CACHE_KEY_PREFIX` - Distributed key namespace (default: "cache:")
    /// - `CACHE_MAX_ENTRIES` - Maximum local cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `RATE_LIMIT_CAPACITY` - Default bucket capacity (default: 100)
    /// - `RATE_LIMIT_REFILL_RATE` - Default refill rate per second (default: 10)
    /// - `RATE_LIMIT_MAX_AGE` - Idle bucket age in seconds (default: 3600)
    /// - `QUEUE_WORKERS` - Task queue workers (default: 2)
    /// - `QUEUE_SHUTDOWN_TIMEOUT` - Shutdown wait in seconds (default: 5)
    /// - `TASK_RETENTION` - Finished task retention in seconds (default: 3600)
    /// - `HOUSEKEEPING_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let redis_url = env::var("REDIS_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env::var("KV_URL").ok().filter(|v| !v.trim().is_empty()));

        Self {
            redis_url,
            cache_key_prefix: env::var("CACHE_KEY_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.cache_key_prefix),
            cache_max_entries: parse_var("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_default_ttl: parse_var("CACHE_DEFAULT_TTL", defaults.cache_default_ttl),
            rate_limit_capacity: parse_var("RATE_LIMIT_CAPACITY", defaults.rate_limit_capacity),
            rate_limit_refill_rate: parse_var(
                "RATE_LIMIT_REFILL_RATE",
                defaults.rate_limit_refill_rate,
            ),
            bucket_max_age: parse_var("RATE_LIMIT_MAX_AGE", defaults.bucket_max_age),
            queue_workers: parse_var("QUEUE_WORKERS", defaults.queue_workers),
            queue_shutdown_timeout: parse_var(
                "QUEUE_SHUTDOWN_TIMEOUT",
                defaults.queue_shutdown_timeout,
            ),
            task_retention: parse_var("TASK_RETENTION", defaults.task_retention),
            housekeeping_interval: parse_var(
                "HOUSEKEEPING_INTERVAL",
                defaults.housekeeping_interval,
            ),
            server_port: parse_var("SERVER_PORT", defaults.server_port),
        }
    }

    pub fn bucket_max_age(&self) -> Duration {
        Duration::from_secs(self.bucket_max_age)
    }

    pub fn queue_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_shutdown_timeout)
    }

    pub fn task_retention(&self) -> Duration {
        Duration::from_secs(self.task_retention)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            cache_key_prefix: "cache:".to_string(),
            cache_max_entries: 1000,
            cache_default_ttl: 300,
            rate_limit_capacity: 100.0,
            rate_limit_refill_rate: 10.0,
            bucket_max_age: 3600,
            queue_workers: 2,
            queue_shutdown_timeout: 5,
            task_retention: 3600,
            housekeeping_interval: 60,
            server_port: 3000,
        }
    }
}

/// Reads and parses an environment variable, falling back to `default`
/// when it is unset or malformed.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
