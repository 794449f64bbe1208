//! Rate Limiting Module
//!
//! Per-key continuous token buckets with lazy creation and idle-bucket sweeps.

mod bucket;
mod limiter;

pub use bucket::{BucketLimits, TokenBucket};
pub use limiter::{RateLimiter, RateLimiterStats};
