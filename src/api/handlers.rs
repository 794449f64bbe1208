//! API Handlers
//!
//! HTTP request handlers for the operational endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::HybridCache;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::{HealthResponse, StatsResponse};
use crate::queue::{PriorityTaskQueue, TaskSnapshot};
use crate::ratelimit::RateLimiter;

/// Application state shared across all handlers.
///
/// Each component is built once and guards its own state, so handlers only
/// need shared references.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<HybridCache>,
    pub limiter: Arc<RateLimiter>,
    pub queue: Arc<PriorityTaskQueue>,
}

impl AppState {
    /// Creates a new AppState from already constructed components.
    pub fn new(cache: HybridCache, limiter: RateLimiter, queue: PriorityTaskQueue) -> Self {
        Self {
            cache: Arc::new(cache),
            limiter: Arc::new(limiter),
            queue: Arc::new(queue),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Connects to the distributed cache when a URL is configured. The queue
    /// is returned stopped; the caller decides when workers start.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            HybridCache::from_config(config),
            RateLimiter::from_config(config),
            PriorityTaskQueue::from_config(config),
        )
    }
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        state.cache.is_distributed(),
        state.queue.is_running(),
    ))
}

/// Handler for GET /stats
///
/// Returns a snapshot of cache, rate limiter and queue counters.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.cache.stats(),
        state.limiter.stats(),
        state.queue.stats(),
    ))
}

/// Handler for GET /tasks/:id
///
/// Returns the task's current snapshot, or 404 if the id is unknown or its
/// record has been pruned.
pub async fn task_status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskSnapshot>> {
    state
        .queue
        .get_status(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyValueCache;
    use crate::queue::{Task, TaskStatus};
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::new(
            HybridCache::local(KeyValueCache::new(100, 300)),
            RateLimiter::new(10.0, 1.0),
            PriorityTaskQueue::new(),
        )
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler(State(test_state())).await;
        assert_eq!(response.status, "healthy");
        assert!(!response.distributed_cache);
        assert!(!response.queue_running);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        state.cache.set("k", json!(1), None);
        state.cache.get("k");
        state.cache.get("missing");
        state.limiter.is_allowed("client");

        let response = stats_handler(State(state)).await;
        assert_eq!(response.cache.hits, 1);
        assert_eq!(response.cache.misses, 1);
        assert_eq!(response.rate_limiter.allowed, 1);
        assert_eq!(response.queue.queue_depth, 0);
    }

    #[tokio::test]
    async fn test_task_status_pending() {
        let state = test_state();
        let id = state
            .queue
            .enqueue(Task::new(|| Ok(json!(null))).with_id("report-1"))
            .unwrap();

        let response = task_status_handler(State(state), Path(id)).await.unwrap();
        assert_eq!(response.id, "report-1");
        assert_eq!(response.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_task_status_not_found() {
        let result = task_status_handler(State(test_state()), Path("nope".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
