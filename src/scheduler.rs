//! Keyed delayed-task scheduler.
//!
//! The pool schedules one dormancy check per In-Use channel and one cooldown
//! removal per claimant. The invariant is at most one pending task per key:
//! scheduling under an existing key cancels and replaces the old task
//! (last writer wins), so deadline recomputation can never accumulate
//! duplicate timers.
//!
//! Task futures return `anyhow::Result<()>`; a failure is logged with the
//! key and never crashes the scheduler. Cancellation aborts the underlying
//! tokio task at its next suspension point and is suppressed at the
//! scheduler boundary: a cancelled task produces no further side effects.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

struct ScheduledTask {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Named delayed-task table.
pub struct TaskScheduler<K> {
    tasks: Mutex<HashMap<K, ScheduledTask>>,
    next_generation: AtomicU64,
}

impl<K> TaskScheduler<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    /// Create a new scheduler.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        })
    }

    /// Schedule `fut` to run after `delay`, replacing any pending task
    /// under `key`.
    pub fn schedule_later<F>(self: &Arc<Self>, delay: Duration, key: K, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::clone(self);
        let task_key = key.clone();

        // Holding the table lock across spawn+insert guarantees the task's
        // own cleanup (which also takes the lock) observes the inserted
        // entry even for zero delays.
        let mut tasks = self.tasks.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(key = ?task_key, generation, "Scheduled task firing");
            if let Err(e) = fut.await {
                error!(key = ?task_key, generation, error = %e, "Scheduled task failed");
            }
            scheduler.finish(&task_key, generation);
        });
        if let Some(prev) = tasks.insert(key.clone(), ScheduledTask { generation, handle }) {
            debug!(key = ?key, "Replacing pending scheduled task");
            prev.handle.abort();
        }
    }

    /// Schedule `fut` to run at the absolute time `when`. Times in the past
    /// run immediately.
    pub fn schedule_at<F>(self: &Arc<Self>, when: DateTime<Utc>, key: K, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let delay = (when - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        self.schedule_later(delay, key, fut);
    }

    /// Cancel the pending task under `key`, if any. Idempotent.
    pub fn cancel(&self, key: &K) {
        if let Some(task) = self.tasks.lock().remove(key) {
            debug!(key = ?key, "Cancelling scheduled task");
            task.handle.abort();
        }
    }

    /// Cancel every pending task (teardown).
    pub fn cancel_all(&self) {
        let mut tasks = self.tasks.lock();
        for (key, task) in tasks.drain() {
            debug!(key = ?key, "Cancelling scheduled task");
            task.handle.abort();
        }
    }

    /// Whether a task is pending under `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.tasks.lock().contains_key(key)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Remove this task's own entry after it ran to completion. A stale
    /// generation means the entry was replaced; leave the successor alone.
    fn finish(&self, key: &K, generation: u64) {
        let mut tasks = self.tasks.lock();
        if tasks.get(key).is_some_and(|t| t.generation == generation) {
            tasks.remove(key);
        }
    }
}

/// Spawn supervised fire-and-forget work.
///
/// Distinct from [`TaskScheduler`] on purpose: callers use this for work
/// that is allowed to race ahead of them (pool replenishment), while
/// anything that must complete before acknowledging a transition is
/// awaited inline.
pub fn spawn_detached<F>(name: &'static str, fut: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            error!(task = name, error = %e, "Detached task failed");
        }
    });
}
