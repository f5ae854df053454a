//! Task data model.
//!
//! Tasks are the atomic units of work handed to the worker pool. Each task
//! tracks its status, retry budget, timing, dependencies, and outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::core::work::{Invocable, ProgressFn};

/// Unique identifier for a task within a queue.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Task status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a worker (or for dependencies to complete).
    #[default]
    Pending,
    /// Time-gated; ineligible until its scheduled time elapses.
    Scheduled,
    /// Currently executing on a worker.
    Running,
    /// Failed an attempt and waiting out the backoff delay.
    Retrying,
    /// Finished successfully.
    Completed,
    /// Exhausted its retry budget or hit a fatal error.
    Failed,
    /// Cancelled before it started.
    Cancelled,
}

impl TaskStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Scheduled, Pending)
                | (Scheduled, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Retrying)
                | (Retrying, Running)
                | (Retrying, Failed)
        )
    }

    /// Check if this is a terminal state: no further transitions occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if a task in this state can still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Scheduled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Running => "running",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a finished task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Whether the final attempt succeeded.
    pub success: bool,
    /// Return value of the work item, if it succeeded.
    pub value: Option<Value>,
    /// Error message of the final attempt, if it failed.
    pub error: Option<String>,
    /// Wall-clock duration of the final attempt.
    pub elapsed: Duration,
    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,
}

impl TaskResult {
    /// Record a successful outcome.
    pub fn success(value: Value, elapsed: Duration) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
            elapsed,
            timestamp: Utc::now(),
        }
    }

    /// Record a failed outcome.
    pub fn failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.into()),
            elapsed,
            timestamp: Utc::now(),
        }
    }

    /// Record a cancellation before execution started.
    pub fn cancelled() -> Self {
        Self {
            success: false,
            value: None,
            error: Some("task cancelled".to_string()),
            elapsed: Duration::ZERO,
            timestamp: Utc::now(),
        }
    }
}

/// When a submitted task becomes eligible for execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// At an absolute point in time.
    At(DateTime<Utc>),
    /// After a delay from submission.
    After(Duration),
}

impl Schedule {
    /// Resolve to an absolute instant relative to `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::At(when) => *when,
            Schedule::After(delay) => {
                now + chrono::Duration::from_std(*delay).unwrap_or(chrono::Duration::zero())
            }
        }
    }
}

/// Options accepted by [`TaskQueue::submit`](crate::TaskQueue::submit).
#[derive(Clone)]
pub struct TaskOptions {
    /// Priority; lower values dequeue first in priority mode.
    pub priority: i64,
    /// Maximum retry attempts after the first failure.
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_delay: Duration,
    /// Optional time gate.
    pub schedule: Option<Schedule>,
    /// Task ids that must complete before this task runs.
    pub dependencies: HashSet<TaskId>,
    /// Opaque key/value bag carried on the task.
    pub metadata: HashMap<String, Value>,
    /// Observer invoked with `(id, fraction)` on progress.
    pub progress: Option<ProgressFn>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self {
            priority: 0,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            schedule: None,
            dependencies: HashSet::new(),
            metadata: HashMap::new(),
            progress: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn scheduled_at(mut self, when: DateTime<Utc>) -> Self {
        self.schedule = Some(Schedule::At(when));
        self
    }

    pub fn scheduled_after(mut self, delay: Duration) -> Self {
        self.schedule = Some(Schedule::After(delay));
        self
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(TaskId, f64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskOptions")
            .field("priority", &self.priority)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("schedule", &self.schedule)
            .field("dependencies", &self.dependencies)
            .field("metadata", &self.metadata)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// A schedulable unit of work.
///
/// The task owns its work item exclusively; the queue hands out statuses
/// and results but never the work itself.
#[derive(Clone)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// The opaque work item.
    pub(crate) work: Arc<dyn Invocable>,
    /// Arguments passed to the work item on every attempt.
    pub(crate) args: Value,
    /// Priority; lower values dequeue first in priority mode.
    pub priority: i64,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Maximum retry attempts after the first failure.
    pub max_retries: u32,
    /// Attempts executed so far.
    pub attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_delay: Duration,
    /// Absolute time gate; ineligible before this instant.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Ids that must complete before this task runs.
    pub dependencies: HashSet<TaskId>,
    /// Outcome, set on terminal transition.
    pub result: Option<TaskResult>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the first attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Opaque key/value bag.
    pub metadata: HashMap<String, Value>,
    /// Progress observer.
    pub(crate) progress: Option<ProgressFn>,
}

impl Task {
    /// Create a task from a work item, its arguments, and options.
    ///
    /// Time-gated tasks start out `Scheduled`, everything else `Pending`.
    pub fn new(work: Arc<dyn Invocable>, args: Value, options: TaskOptions) -> Self {
        let now = Utc::now();
        let scheduled_time = options.schedule.map(|s| s.resolve(now));
        let status = if scheduled_time.is_some() {
            TaskStatus::Scheduled
        } else {
            TaskStatus::Pending
        };

        Self {
            id: TaskId::new(),
            work,
            args,
            priority: options.priority,
            status,
            max_retries: options.max_retries,
            attempts: 0,
            retry_delay: options.retry_delay,
            scheduled_time,
            dependencies: options.dependencies,
            result: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            metadata: options.metadata,
            progress: options.progress,
        }
    }

    /// Check if the task can execute given the set of completed ids.
    pub fn can_execute(&self, completed: &HashSet<TaskId>) -> bool {
        self.dependencies.is_subset(completed)
    }

    /// Check if the time gate (if any) has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.scheduled_time {
            Some(when) => now >= when,
            None => true,
        }
    }

    /// Promote a time-gated task into the pending pool.
    pub fn promote(&mut self) {
        self.status = TaskStatus::Pending;
    }

    /// Start an execution attempt.
    ///
    /// Transitions to `Running`, records the start time on the first
    /// attempt, and bumps the attempt counter.
    pub fn begin_attempt(&mut self) {
        self.status = TaskStatus::Running;
        self.attempts += 1;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Mark an attempt as failed with retries remaining.
    pub fn mark_retrying(&mut self) {
        self.status = TaskStatus::Retrying;
    }

    /// Mark the task as successfully completed.
    pub fn complete(&mut self, result: TaskResult) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
    }

    /// Mark the task as terminally failed.
    pub fn fail(&mut self, result: TaskResult) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
    }

    /// Cancel a task that has not started.
    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.result = Some(TaskResult::cancelled());
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Invoke the progress observer, if one was registered.
    pub fn update_progress(&self, fraction: f64) {
        if let Some(cb) = &self.progress {
            cb(self.id, fraction);
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("attempts", &self.attempts)
            .field("max_retries", &self.max_retries)
            .field("scheduled_time", &self.scheduled_time)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}
