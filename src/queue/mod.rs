//! Task Queue Module
//!
//! In-process priority queue of deferred work drained by worker threads.
//!
//! # Lifecycle
//! Each task moves `pending -> running -> completed | failed`. A failing or
//! panicking task is recorded as failed and never stops its worker.

mod task;
mod worker_pool;

pub use task::{Task, TaskPayload, TaskSnapshot, TaskStatus, DEFAULT_PRIORITY};
pub use worker_pool::{PriorityTaskQueue, QueueStats};
