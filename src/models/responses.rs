//! Response DTOs for the operational HTTP surface
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::queue::QueueStats;
use crate::ratelimit::RateLimiterStats;

/// Response body for the stats endpoint (GET /stats)
///
/// One snapshot per component, each taken under that component's own lock.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub rate_limiter: RateLimiterStats,
    pub queue: QueueStats,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, rate_limiter: RateLimiterStats, queue: QueueStats) -> Self {
        Self {
            cache,
            rate_limiter,
            queue,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Whether the cache is backed by the distributed store
    pub distributed_cache: bool,
    /// Whether queue workers are accepting work
    pub queue_running: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(distributed_cache: bool, queue_running: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            distributed_cache,
            queue_running,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
