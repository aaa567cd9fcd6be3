//! In-memory task registry.
//!
//! The registry is the single authority for live task lifecycle state.
//! Every state change goes through a validated transition so an illegal
//! edge can never be recorded, and compare-and-transition lets racing
//! writers (agent completion, disconnect cleanup, timeouts) settle on
//! exactly one winner under the registry lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{AppError, Result};
use crate::models::{Task, TaskState};

/// Cadence of the expired-task eviction sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Multiplier on the grace period after which a non-terminal entry
/// counts as abandoned.
const STALE_MULTIPLIER: i64 = 12;

/// Registry of live tasks keyed by task id.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, Task>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new task.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidTaskState`] if a task with the same id
    /// is already registered.
    pub fn create(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.contains_key(&task.id) {
            return Err(AppError::InvalidTaskState(format!(
                "task {} already exists",
                task.id
            )));
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Look up a task by id, returning a snapshot copy.
    #[must_use]
    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
    }

    /// Transition a task to `next`, validating the edge.
    ///
    /// Returns the updated task snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::TaskNotFound`] if the id is unknown and
    /// [`AppError::InvalidTaskState`] if the current state does not
    /// permit the transition.
    pub fn transition(&self, task_id: &str, next: TaskState) -> Result<Task> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| AppError::TaskNotFound(format!("task {task_id} not found")))?;
        if !task.state.can_transition_to(next) {
            return Err(AppError::InvalidTaskState(format!(
                "cannot transition task {task_id} from {} to {next}",
                task.state
            )));
        }
        task.state = next;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    /// Transition only if the task is currently in `expected`.
    ///
    /// Returns `Ok(true)` when the transition was applied and
    /// `Ok(false)` when another writer already moved the task out of
    /// `expected`. The check and the write happen under one lock hold.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::TaskNotFound`] if the id is unknown and
    /// [`AppError::InvalidTaskState`] if `expected` does not permit the
    /// transition to `next`.
    pub fn transition_if(
        &self,
        task_id: &str,
        expected: TaskState,
        next: TaskState,
    ) -> Result<bool> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| AppError::TaskNotFound(format!("task {task_id} not found")))?;
        if task.state != expected {
            return Ok(false);
        }
        if !expected.can_transition_to(next) {
            return Err(AppError::InvalidTaskState(format!(
                "cannot transition task {task_id} from {expected} to {next}"
            )));
        }
        task.state = next;
        task.updated_at = Utc::now();
        Ok(true)
    }

    /// Remove a task, returning it if present.
    pub fn remove(&self, task_id: &str) -> Option<Task> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(task_id)
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every registered task.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Evict expired tasks, returning the number evicted.
    ///
    /// Terminal tasks go once their last update is older than `grace`.
    /// Non-terminal tasks are normally settled by their handler, but an
    /// entry orphaned before any handler ran (a client gone between
    /// request and stream start, a paused conversation never resumed)
    /// would otherwise linger forever; those go once idle past
    /// [`STALE_MULTIPLIER`] times the grace period, floored at one
    /// second so a zero grace still spares fresh live entries.
    pub fn sweep_expired(&self, grace: Duration) -> usize {
        let grace_secs = i64::try_from(grace.as_secs()).unwrap_or(i64::MAX);
        let stale_secs = grace_secs.saturating_mul(STALE_MULTIPLIER).max(1);
        let now = Utc::now();
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, task| {
            let idle = (now - task.updated_at).num_seconds();
            if task.state.is_terminal() {
                idle < grace_secs
            } else {
                idle < stale_secs
            }
        });
        before - tasks.len()
    }
}

/// Spawn the expired-task eviction background task.
///
/// Runs once a minute, removing terminal tasks that have sat past the
/// retention grace period without being collected by their caller and
/// abandoned non-terminal entries idle past the stale horizon.
#[must_use]
pub fn spawn_sweep_task(
    tasks: Arc<TaskRegistry>,
    grace: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("task registry sweep shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let evicted = tasks.sweep_expired(grace);
                    if evicted > 0 {
                        info!(evicted, remaining = tasks.len(), "evicted expired tasks");
                    }
                }
            }
        }
    })
}
