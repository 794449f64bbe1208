//! Housekeeping Task
//!
//! Background task that periodically bounds the memory held by long-lived
//! components: idle rate limit buckets and finished task records.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::queue::PriorityTaskQueue;
use crate::ratelimit::RateLimiter;

/// What a single housekeeping pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub buckets_removed: usize,
    pub tasks_pruned: usize,
}

/// Runs one housekeeping pass.
///
/// # Arguments
/// * `limiter` - Rate limiter whose buckets idle longer than `bucket_max_age` are dropped
/// * `queue` - Task queue whose finished records older than `task_retention` are dropped
pub fn run_housekeeping(
    limiter: &RateLimiter,
    queue: &PriorityTaskQueue,
    bucket_max_age: Duration,
    task_retention: Duration,
) -> HousekeepingReport {
    HousekeepingReport {
        buckets_removed: limiter.cleanup(bucket_max_age),
        tasks_pruned: queue.prune_finished(task_retention),
    }
}

/// Spawns a background task that runs `run_housekeeping` every `interval`.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_housekeeping_task(limiter, queue, Duration::from_secs(60),
///     Duration::from_secs(3600), Duration::from_secs(3600));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_housekeeping_task(
    limiter: Arc<RateLimiter>,
    queue: Arc<PriorityTaskQueue>,
    interval: Duration,
    bucket_max_age: Duration,
    task_retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting housekeeping task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let report = run_housekeeping(&limiter, &queue, bucket_max_age, task_retention);

            if report == HousekeepingReport::default() {
                debug!("Housekeeping: nothing to remove");
            } else {
                info!(
                    buckets_removed = report.buckets_removed,
                    tasks_pruned = report.tasks_pruned,
                    "Housekeeping pass complete"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::queue::Task;
    use serde_json::json;

    #[test]
    fn test_run_housekeeping_sweeps_both() {
        let clock = ManualClock::new();
        let limiter = RateLimiter::with_clock(5.0, 1.0, Arc::new(clock.clone()));
        let queue = PriorityTaskQueue::new().with_poll_interval(Duration::from_millis(20));

        limiter.is_allowed("idle-client");
        clock.advance(Duration::from_secs(120));

        queue.start(1);
        let id = queue.enqueue(Task::new(|| Ok(json!(1)))).unwrap();
        queue.wait_for(&id, Duration::from_secs(5)).unwrap();
        queue.stop();

        let report = run_housekeeping(&limiter, &queue, Duration::from_secs(60), Duration::ZERO);
        assert_eq!(
            report,
            HousekeepingReport {
                buckets_removed: 1,
                tasks_pruned: 1
            }
        );
    }

    #[tokio::test]
    async fn test_housekeeping_task_prunes_in_background() {
        let limiter = Arc::new(RateLimiter::new(5.0, 1.0));
        let queue = Arc::new(PriorityTaskQueue::new().with_poll_interval(Duration::from_millis(20)));

        queue.start(1);
        let id = queue.enqueue(Task::new(|| Ok(json!("done")))).unwrap();
        {
            let queue = Arc::clone(&queue);
            let id = id.clone();
            tokio::task::spawn_blocking(move || queue.wait_for(&id, Duration::from_secs(5)))
                .await
                .unwrap();
        }

        let handle = spawn_housekeeping_task(
            limiter,
            Arc::clone(&queue),
            Duration::from_millis(50),
            Duration::from_secs(3600),
            Duration::ZERO,
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(queue.get_status(&id).is_none(), "Finished record should be pruned");

        handle.abort();
        queue.stop();
    }

    #[tokio::test]
    async fn test_housekeeping_task_can_be_aborted() {
        let handle = spawn_housekeeping_task(
            Arc::new(RateLimiter::new(5.0, 1.0)),
            Arc::new(PriorityTaskQueue::new()),
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
