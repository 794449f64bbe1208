//! Error types
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Backend Error Enum ==
/// Failure of a single call against the distributed cache store.
///
/// These never reach cache callers: the distributed adapter inspects them once,
/// logs, and degrades the call to a miss or a `false` outcome.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Store could not be reached or no connection is available
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Transport or protocol failure reported by the Redis client
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// No pooled connection became available in time
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Value could not be converted to or from its transport form
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == Queue Error Enum ==
/// Errors raised when submitting work to the task queue.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// A task with the same id is already tracked
    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(String),
}

// == Api Error Enum ==
/// Errors returned by the HTTP surface.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected by the rate limiter
    #[error("Too many requests: {0}")]
    RateLimited(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Result Type Aliases ==
/// Result of a distributed store call.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result type for HTTP handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
