//! Priority Task Queue Module
//!
//! A pool of worker threads draining a priority-ordered queue of tasks.
//!
//! Shared state is split across independent locks: the pending heap, the task
//! record table, and the worker handle list. No lock is held while a task's
//! payload runs, so arbitrary caller work cannot deadlock the queue's
//! bookkeeping.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::QueueError;
use crate::queue::{Task, TaskPayload, TaskSnapshot};

/// How long an idle worker blocks before re-checking the running flag.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default upper bound on waiting for workers in `stop`.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// == Queued Task ==
/// Heap entry. Ordered so the max-heap pops the lowest priority value first,
/// and among equal priorities the earliest enqueued.
struct QueuedTask {
    priority: i64,
    seq: u64,
    id: String,
    payload: TaskPayload,
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for QueuedTask {}

// == Queue Stats ==
/// Read-only snapshot of queue activity.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Tasks waiting to be picked up
    pub queue_depth: usize,
    /// Worker threads currently owned by the queue
    pub workers: usize,
    /// Tasks that completed successfully
    pub processed: u64,
    /// Tasks whose payload returned an error or panicked
    pub failed: u64,
    /// Whether workers are accepting work
    pub running: bool,
}

/// State shared between the queue handle and its workers.
struct Shared {
    pending: Mutex<BinaryHeap<QueuedTask>>,
    available: Condvar,
    records: Mutex<HashMap<String, TaskSnapshot>>,
    finished: Condvar,
    running: AtomicBool,
    /// Bumped on every stop so abandoned workers exit even after a restart.
    generation: AtomicU64,
    next_seq: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }

    /// Blocks up to `poll` for a task. Returns None on timeout or shutdown.
    fn next_job(&self, generation: u64, poll: Duration) -> Option<QueuedTask> {
        let mut pending = self.pending.lock();
        if !self.is_current(generation) {
            return None;
        }
        if pending.is_empty() {
            self.available.wait_for(&mut pending, poll);
            if !self.is_current(generation) {
                return None;
            }
        }
        pending.pop()
    }

    /// Runs one task, recording its outcome. Never panics.
    fn execute(&self, job: QueuedTask) {
        let QueuedTask { id, payload, .. } = job;

        if let Some(record) = self.records.lock().get_mut(&id) {
            record.mark_running();
        }
        debug!(task_id = %id, "Task started");

        let outcome = match panic::catch_unwind(AssertUnwindSafe(payload)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(panic) => Err(panic_message(&*panic)),
        };

        let mut records = self.records.lock();
        match outcome {
            Ok(value) => {
                self.processed.fetch_add(1, Ordering::Relaxed);
                if let Some(record) = records.get_mut(&id) {
                    record.mark_completed(value);
                }
                debug!(task_id = %id, "Task completed");
            }
            Err(message) => {
                let message = if message.trim().is_empty() {
                    "task failed without an error message".to_string()
                } else {
                    message
                };
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(task_id = %id, error = %message, "Task failed");
                if let Some(record) = records.get_mut(&id) {
                    record.mark_failed(message);
                }
            }
        }
        self.finished.notify_all();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("task panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("task panicked: {}", message)
    } else {
        "task panicked".to_string()
    }
}

/// Worker thread body. `_exited` is dropped on return, which tells `stop`
/// this worker is done.
fn run_worker(shared: Arc<Shared>, generation: u64, poll: Duration, _exited: Sender<()>) {
    debug!(generation, "Task worker started");
    while shared.is_current(generation) {
        if let Some(job) = shared.next_job(generation, poll) {
            shared.execute(job);
        }
    }
    debug!(generation, "Task worker exiting");
}

struct Worker {
    name: String,
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

// == Priority Task Queue ==
pub struct PriorityTaskQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<Worker>>,
    poll_interval: Duration,
    shutdown_timeout: Duration,
}

impl std::fmt::Debug for PriorityTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityTaskQueue")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Default for PriorityTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityTaskQueue {
    // == Constructors ==
    /// Creates a stopped queue. Call `start` to spawn workers.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(BinaryHeap::new()),
                available: Condvar::new(),
                records: Mutex::new(HashMap::new()),
                finished: Condvar::new(),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                next_seq: AtomicU64::new(0),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            workers: Mutex::new(Vec::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new().with_shutdown_timeout(config.queue_shutdown_timeout())
    }

    /// Sets the upper bound `stop` waits for workers to exit.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets how long an idle worker blocks before re-checking for shutdown.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll_interval = poll.max(Duration::from_millis(1));
        self
    }

    // == Enqueue ==
    /// Registers `task` and queues it for execution.
    ///
    /// Tasks may be enqueued before `start`; they wait until workers run.
    ///
    /// # Errors
    /// Returns `QueueError::DuplicateTaskId` if a task with the same id is
    /// still tracked.
    pub fn enqueue(&self, task: Task) -> Result<String, QueueError> {
        let Task {
            id,
            priority,
            payload,
        } = task;

        {
            let mut records = self.shared.records.lock();
            if records.contains_key(&id) {
                return Err(QueueError::DuplicateTaskId(id));
            }
            records.insert(id.clone(), TaskSnapshot::pending(&id, priority));
        }

        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        self.shared.pending.lock().push(QueuedTask {
            priority,
            seq,
            id: id.clone(),
            payload,
        });
        self.shared.available.notify_one();

        debug!(task_id = %id, priority, "Task enqueued");
        Ok(id)
    }

    // == Start ==
    /// Spawns `worker_count` workers. No-op if the queue is already running.
    pub fn start(&self, worker_count: usize) {
        let mut workers = self.workers.lock();
        if self.shared.running.load(Ordering::Acquire) {
            return;
        }

        let generation = self.shared.generation.load(Ordering::Acquire);
        self.shared.running.store(true, Ordering::Release);

        for index in 0..worker_count {
            let name = format!("task-worker-{}", index);
            let (exited_tx, exited_rx) = channel::bounded(0);
            let shared = Arc::clone(&self.shared);
            let poll = self.poll_interval;

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(shared, generation, poll, exited_tx));

            match spawned {
                Ok(handle) => workers.push(Worker {
                    name,
                    handle,
                    exited: exited_rx,
                }),
                Err(e) => error!(worker = %name, error = %e, "Failed to spawn task worker"),
            }
        }

        info!(workers = workers.len(), "Task queue started");
    }

    // == Stop ==
    /// Signals every worker to exit and joins them, waiting at most the
    /// shutdown timeout in total.
    ///
    /// Workers still busy at the deadline are abandoned, not killed; they exit
    /// after their current task. Pending tasks stay queued for a later `start`.
    pub fn stop(&self) {
        let workers = {
            let mut workers = self.workers.lock();
            let was_running = self.shared.running.swap(false, Ordering::AcqRel);
            if !was_running && workers.is_empty() {
                return;
            }
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            std::mem::take(&mut *workers)
        };

        {
            let _pending = self.shared.pending.lock();
            self.shared.available.notify_all();
        }

        let deadline = Instant::now() + self.shutdown_timeout;
        for worker in workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match worker.exited.recv_timeout(remaining) {
                Err(RecvTimeoutError::Timeout) => {
                    warn!(worker = %worker.name, "Task worker did not stop in time, abandoning it");
                }
                _ => {
                    if worker.handle.join().is_err() {
                        warn!(worker = %worker.name, "Task worker panicked");
                    }
                }
            }
        }

        info!("Task queue stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    // == Status ==
    /// Returns a snapshot of the task with `id`, if tracked.
    pub fn get_status(&self, id: &str) -> Option<TaskSnapshot> {
        self.shared.records.lock().get(id).cloned()
    }

    /// Blocks until the task with `id` reaches a terminal state or `timeout`
    /// elapses, then returns its latest snapshot.
    pub fn wait_for(&self, id: &str, timeout: Duration) -> Option<TaskSnapshot> {
        let deadline = Instant::now() + timeout;
        let mut records = self.shared.records.lock();
        loop {
            let snapshot = records.get(id)?;
            if snapshot.status.is_terminal() {
                return Some(snapshot.clone());
            }
            if self
                .shared
                .finished
                .wait_until(&mut records, deadline)
                .timed_out()
            {
                return records.get(id).cloned();
            }
        }
    }

    // == Retention ==
    /// Drops completed and failed records that finished more than
    /// `older_than` ago. Returns the number removed.
    pub fn prune_finished(&self, older_than: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| chrono::Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let mut records = self.shared.records.lock();
        let before = records.len();
        records.retain(|_, record| {
            !(record.status.is_terminal() && record.finished_at.is_some_and(|at| at <= cutoff))
        });

        let removed = before - records.len();
        if removed > 0 {
            info!(removed, "Pruned finished task records");
        }
        removed
    }

    // == Stats ==
    /// Each lock is taken and released on its own, never two at once.
    pub fn stats(&self) -> QueueStats {
        let queue_depth = self.shared.pending.lock().len();
        let workers = self.workers.lock().len();

        QueueStats {
            queue_depth,
            workers,
            processed: self.shared.processed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            running: self.is_running(),
        }
    }
}

impl Drop for PriorityTaskQueue {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        let _pending = self.shared.pending.lock();
        self.shared.available.notify_all();
    }
}
