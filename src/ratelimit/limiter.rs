//! Rate Limiter Module
//!
//! Maps caller-supplied keys to lazily created token buckets.
//!
//! Locking: the bucket map has its own lock, held only to look up, insert or
//! remove buckets. Each bucket has its own lock covering refill, check and
//! debit, so unrelated keys never serialize on each other. Decision counters
//! sit behind a third lock and are updated after the decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::ratelimit::{BucketLimits, TokenBucket};

type SharedBucket = Arc<Mutex<TokenBucket>>;

#[derive(Debug, Default)]
struct DecisionCounters {
    allowed: u64,
    blocked: u64,
}

// == Rate Limiter Stats ==
/// Read-only snapshot of rate limiter activity.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    /// Buckets currently tracked
    pub buckets: usize,
    /// Requests admitted since start
    pub allowed: u64,
    /// Requests rejected since start
    pub blocked: u64,
    /// blocked / (allowed + blocked), 0.0 before any request
    pub block_rate: f64,
}

// == Rate Limiter ==
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, SharedBucket>>,
    counters: Mutex<DecisionCounters>,
    default_limits: BucketLimits,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    // == Constructors ==
    /// Creates a limiter whose new buckets default to `capacity` tokens
    /// refilled at `refill_rate` tokens per second.
    pub fn new(default_capacity: f64, default_refill_rate: f64) -> Self {
        Self::with_clock(default_capacity, default_refill_rate, SystemClock::shared())
    }

    pub fn with_clock(default_capacity: f64, default_refill_rate: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            counters: Mutex::new(DecisionCounters::default()),
            default_limits: BucketLimits::new(default_capacity, default_refill_rate),
            clock,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.rate_limit_capacity, config.rate_limit_refill_rate)
    }

    pub fn default_limits(&self) -> BucketLimits {
        self.default_limits
    }

    // == Is Allowed ==
    /// Admits one unit of work for `key` using the default limits.
    pub fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_with(key, 1, None)
    }

    /// Admits `cost` tokens of work for `key`.
    ///
    /// `limits` only takes effect when this call creates the bucket; existing
    /// buckets keep the limits they were created with.
    pub fn is_allowed_with(&self, key: &str, cost: u32, limits: Option<BucketLimits>) -> bool {
        let bucket = self.bucket_for(key, limits.unwrap_or(self.default_limits));
        let (allowed, capacity, refill_rate) = {
            let mut bucket = bucket.lock();
            let allowed = bucket.consume(cost, self.clock.now());
            (allowed, bucket.capacity(), bucket.refill_rate())
        };

        let mut counters = self.counters.lock();
        if allowed {
            counters.allowed += 1;
        } else {
            counters.blocked += 1;
            warn!(key, cost, capacity, refill_rate, "Rate limit exceeded");
        }
        allowed
    }

    /// Returns the bucket for `key`, creating it with `limits` if absent.
    fn bucket_for(&self, key: &str, limits: BucketLimits) -> SharedBucket {
        let mut buckets = self.buckets.lock();
        if let Some(bucket) = buckets.get(key) {
            return Arc::clone(bucket);
        }

        debug!(key, capacity = limits.capacity, refill_rate = limits.refill_rate, "Creating rate limit bucket");
        let bucket = Arc::new(Mutex::new(TokenBucket::new(limits, self.clock.now())));
        buckets.insert(key.to_string(), Arc::clone(&bucket));
        bucket
    }

    // == Tokens ==
    /// Returns the balance `key`'s bucket would have if refilled now, or None
    /// if no bucket exists.
    ///
    /// Works on a copy, so peeking never counts as activity for `cleanup`.
    pub fn tokens(&self, key: &str) -> Option<f64> {
        let bucket = self.buckets.lock().get(key).cloned()?;
        let mut peek = bucket.lock().clone();
        peek.refill(self.clock.now());
        Some(peek.tokens())
    }

    // == Cleanup ==
    /// Removes buckets not refilled within `max_age`.
    ///
    /// Holds the map lock for the sweep and each bucket's lock while reading
    /// it, so a bucket is never removed in the middle of a consume.
    /// Returns the number of buckets removed.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();
        let before = buckets.len();

        buckets.retain(|_, bucket| {
            now.saturating_duration_since(bucket.lock().last_refill()) <= max_age
        });

        let removed = before - buckets.len();
        if removed > 0 {
            info!(removed, "Cleaned up idle rate limit buckets");
        }
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> RateLimiterStats {
        let buckets = self.buckets.lock().len();
        let counters = self.counters.lock();
        let total = counters.allowed + counters.blocked;

        RateLimiterStats {
            buckets,
            allowed: counters.allowed,
            blocked: counters.blocked,
            block_rate: if total == 0 {
                0.0
            } else {
                counters.blocked as f64 / total as f64
            },
        }
    }
}
