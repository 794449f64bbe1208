//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint through the router,
//! including the rate limiting middleware.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use service_guard::{
    api::create_router,
    cache::{HybridCache, KeyValueCache},
    AppState, PriorityTaskQueue, RateLimiter, Task,
};
use tower::ServiceExt;

// == Helper Functions ==

fn create_state(capacity: f64) -> AppState {
    AppState::new(
        HybridCache::local(KeyValueCache::new(100, 300)),
        RateLimiter::new(capacity, 0.0),
        PriorityTaskQueue::new().with_poll_interval(Duration::from_millis(20)),
    )
}

fn create_test_app() -> Router {
    create_router(create_state(100.0))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_from(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let response = create_test_app().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["distributed_cache"], false);
    assert!(json["timestamp"].as_str().is_some());
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint_reports_all_components() {
    let state = create_state(100.0);
    state.cache.set("user:1", json!({"name": "ada"}), None);
    state.cache.get("user:1");
    state.cache.get("user:2");
    let app = create_router(state);

    let response = app.oneshot(get("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache"]["backend"], "in-memory");
    assert_eq!(json["cache"]["hits"], 1);
    assert_eq!(json["cache"]["misses"], 1);
    assert_eq!(json["cache"]["hit_rate"], 0.5);
    assert_eq!(json["cache"]["entries"], 1);
    // The /stats request itself was admitted by the limiter.
    assert_eq!(json["rate_limiter"]["allowed"], 1);
    assert_eq!(json["rate_limiter"]["buckets"], 1);
    assert_eq!(json["queue"]["processed"], 0);
}

// == TASKS Endpoint Tests ==

#[tokio::test]
async fn test_task_status_not_found() {
    let response = create_test_app()
        .oneshot(get("/tasks/missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_task_status_pending() {
    let state = create_state(100.0);
    let id = state
        .queue
        .enqueue(Task::new(|| Ok(json!(1))).with_priority(2))
        .unwrap();
    let app = create_router(state);

    let response = app.oneshot(get(&format!("/tasks/{}", id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["id"], id.as_str());
    assert_eq!(json["priority"], 2);
    assert_eq!(json["status"], "pending");
    assert!(json["result"].is_null());
}

#[tokio::test]
async fn test_task_status_completed() {
    let state = create_state(100.0);
    state.queue.start(1);
    let id = state
        .queue
        .enqueue(Task::new(|| Ok(json!({"sent": 3}))).with_id("digest"))
        .unwrap();

    let queue = state.queue.clone();
    let waited = tokio::task::spawn_blocking(move || queue.wait_for(&id, Duration::from_secs(5)))
        .await
        .unwrap();
    assert!(waited.is_some());

    let app = create_router(state.clone());
    let response = app.oneshot(get("/tasks/digest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["result"]["sent"], 3);
    assert!(json["finished_at"].as_str().is_some());

    let queue = state.queue.clone();
    tokio::task::spawn_blocking(move || queue.stop()).await.unwrap();
}

#[tokio::test]
async fn test_task_status_failed() {
    let state = create_state(100.0);
    state.queue.start(1);
    let id = state
        .queue
        .enqueue(Task::new(|| Err(anyhow::anyhow!("smtp unreachable"))))
        .unwrap();

    let queue = state.queue.clone();
    let poll_id = id.clone();
    tokio::task::spawn_blocking(move || queue.wait_for(&poll_id, Duration::from_secs(5)))
        .await
        .unwrap();

    let app = create_router(state.clone());
    let response = app.oneshot(get(&format!("/tasks/{}", id))).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "failed");
    assert_eq!(json["error"], "smtp unreachable");

    let queue = state.queue.clone();
    tokio::task::spawn_blocking(move || queue.stop()).await.unwrap();
}

// == Rate Limiting Tests ==

#[tokio::test]
async fn test_rate_limit_rejects_with_429() {
    let app = create_router(create_state(2.0));

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("unknown:/health"));
}

#[tokio::test]
async fn test_rate_limit_is_per_client_and_path() {
    let state = create_state(1.0);
    let app = create_router(state.clone());

    let first = app.clone().oneshot(get_from("/health", "10.0.0.1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let same = app.clone().oneshot(get_from("/health", "10.0.0.1")).await.unwrap();
    assert_eq!(same.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_client = app.clone().oneshot(get_from("/health", "10.0.0.2")).await.unwrap();
    assert_eq!(other_client.status(), StatusCode::OK);

    let other_path = app.oneshot(get_from("/stats", "10.0.0.1")).await.unwrap();
    assert_eq!(other_path.status(), StatusCode::OK);

    let stats = state.limiter.stats();
    assert_eq!(stats.allowed, 3);
    assert_eq!(stats.blocked, 1);
    assert_eq!(stats.buckets, 3);
}

#[tokio::test]
async fn test_forwarded_for_uses_first_entry() {
    let state = create_state(1.0);
    let app = create_router(state.clone());

    app.oneshot(get_from("/health", "203.0.113.9, 10.1.1.1"))
        .await
        .unwrap();

    assert!(state.limiter.tokens("203.0.113.9:/health").is_some());
    assert!(state.limiter.tokens("10.1.1.1:/health").is_none());
}
