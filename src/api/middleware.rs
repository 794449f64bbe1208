//! Rate Limiting Middleware
//!
//! Admits every request through the shared [`RateLimiter`](crate::ratelimit::RateLimiter)
//! before it reaches a handler.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use super::handlers::AppState;
use crate::error::ApiError;

/// Client address used when no forwarding header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Returns the first `X-Forwarded-For` entry, or `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Limiter key for a request: `"{client_ip}:{path}"`.
pub fn rate_limit_key(headers: &HeaderMap, path: &str) -> String {
    format!("{}:{}", client_ip(headers), path)
}

/// Rejects the request with 429 when the caller's bucket is empty.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = rate_limit_key(request.headers(), request.uri().path());

    if !state.limiter.is_allowed(&key) {
        return Err(ApiError::RateLimited(format!(
            "Rate limit exceeded for {}",
            key
        )));
    }

    Ok(next.run(request).await)
}
