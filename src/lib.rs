//! Service Guard - shared backend support primitives
//!
//! A hybrid distributed-or-local cache, a per-key token-bucket rate limiter,
//! and an in-process priority task queue, plus a small operational HTTP
//! surface over them.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod ratelimit;
pub mod tasks;

pub use api::AppState;
pub use cache::HybridCache;
pub use config::Config;
pub use queue::{PriorityTaskQueue, Task, TaskStatus};
pub use ratelimit::RateLimiter;
pub use tasks::spawn_housekeeping_task;
