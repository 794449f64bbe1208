//! Task Module
//!
//! A unit of deferred work and the record tracking its lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Priority given to tasks that do not set one. Lower runs first.
pub const DEFAULT_PRIORITY: i64 = 5;

/// Deferred invocation; arguments are captured by the closure.
pub type TaskPayload = Box<dyn FnOnce() -> anyhow::Result<Value> + Send + 'static>;

// == Task Status ==
/// Lifecycle: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed and failed tasks never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

// == Task ==
/// Work submitted to the queue.
pub struct Task {
    pub(crate) id: String,
    pub(crate) priority: i64,
    pub(crate) payload: TaskPayload,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Wraps `work` with a fresh id and the default priority.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Value> + Send + 'static,
    {
        Self {
            id: format!("task_{}", Uuid::new_v4().simple()),
            priority: DEFAULT_PRIORITY,
            payload: Box::new(work),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }
}

// == Task Snapshot ==
/// Point-in-time view of a task, as returned by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub priority: i64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Value returned by a completed task
    pub result: Option<Value>,
    /// Error message of a failed task
    pub error: Option<String>,
}

impl TaskSnapshot {
    pub(crate) fn pending(id: &str, priority: i64) -> Self {
        Self {
            id: id.to_string(),
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_completed(&mut self, result: Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn mark_failed(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }
}
