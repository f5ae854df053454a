//! The task queue public surface.
//!
//! A `TaskQueue` owns a task table, a completed-id set, a scheduled set, a
//! dependency graph, and a ready queue, all behind one mutex. A bounded
//! pool of workers and a scheduler loop are spawned on `start()` and share
//! that state. Only user work execution and backoff sleeps happen outside
//! the lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::core::graph::DependencyGraph;
use crate::core::task::{Task, TaskId, TaskOptions, TaskResult, TaskStatus};
use crate::core::work::Invocable;
use crate::engine::persist::Snapshot;
use crate::engine::ready::ReadyQueue;
use crate::engine::stats::QueueStats;
use crate::engine::{scheduler, worker};
use crate::error::{Error, Result};

pub(crate) struct QueueState {
    pub(crate) tasks: HashMap<TaskId, Task>,
    pub(crate) completed: HashSet<TaskId>,
    pub(crate) scheduled: Vec<TaskId>,
    pub(crate) graph: DependencyGraph,
    pub(crate) ready: ReadyQueue,
    pub(crate) running: bool,
    workers: Vec<JoinHandle<()>>,
    scheduler: Option<JoinHandle<()>>,
    shutdown: Option<CancellationToken>,
}

pub(crate) struct QueueCore {
    pub(crate) config: QueueConfig,
    pub(crate) state: Mutex<QueueState>,
    /// Woken once per task entering the ready queue.
    pub(crate) work_ready: Notify,
    /// Woken on every terminal transition, for `wait_for_task`.
    pub(crate) task_done: Notify,
}

impl QueueCore {
    /// Write a snapshot if persistence is enabled. Failures are logged and
    /// swallowed; persistence is best-effort by contract.
    pub(crate) async fn persist(&self) {
        if !self.config.persistent {
            return;
        }
        let snapshot = {
            let state = self.state.lock().await;
            Snapshot::capture(&self.config, &state.tasks, &state.completed)
        };
        let path = self.config.snapshot_path();
        if let Err(err) = snapshot.write(&path) {
            warn!(path = %path.display(), error = %err, "failed to write queue snapshot");
        }
    }
}

/// In-process task queue with a bounded worker pool.
///
/// Cloning is cheap and shares the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    core: Arc<QueueCore>,
}

impl TaskQueue {
    /// Create a queue. With persistence enabled, the completed-id set is
    /// restored from the snapshot file; pending or running tasks from a
    /// prior process are not resurrected and must be resubmitted.
    pub fn new(config: QueueConfig) -> Self {
        let mut completed = HashSet::new();
        if config.persistent {
            match Snapshot::read(&config.snapshot_path()) {
                Ok(Some(snapshot)) => {
                    info!(
                        name = %config.name,
                        completed = snapshot.completed.len(),
                        "restored completed-id set from snapshot"
                    );
                    completed = snapshot.completed;
                }
                Ok(None) => debug!(name = %config.name, "no snapshot file found"),
                Err(err) => warn!(name = %config.name, error = %err, "failed to load snapshot"),
            }
        }

        info!(
            name = %config.name,
            mode = %config.mode,
            max_workers = config.max_workers,
            "task queue initialized"
        );

        let state = QueueState {
            tasks: HashMap::new(),
            completed,
            scheduled: Vec::new(),
            graph: DependencyGraph::new(),
            ready: ReadyQueue::new(config.mode),
            running: false,
            workers: Vec::new(),
            scheduler: None,
            shutdown: None,
        };

        Self {
            core: Arc::new(QueueCore {
                config,
                state: Mutex::new(state),
                work_ready: Notify::new(),
                task_done: Notify::new(),
            }),
        }
    }

    /// Start the worker pool and the scheduler loop. Idempotent.
    pub async fn start(&self) {
        {
            let mut state = self.core.state.lock().await;
            if state.running {
                warn!(name = %self.core.config.name, "task queue is already running");
                return;
            }
            state.running = true;

            let token = CancellationToken::new();
            state.shutdown = Some(token.clone());

            let worker_count = self.core.config.max_workers.max(1);
            for index in 0..worker_count {
                state.workers.push(tokio::spawn(worker::run(
                    Arc::clone(&self.core),
                    token.clone(),
                    index,
                )));
            }
            state.scheduler = Some(tokio::spawn(scheduler::run(
                Arc::clone(&self.core),
                token.clone(),
            )));

            info!(
                name = %self.core.config.name,
                workers = worker_count,
                "task queue started"
            );
        }
        self.core.persist().await;
    }

    /// Stop the queue.
    ///
    /// `wait = true`: in-flight tasks finish, then workers and the
    /// scheduler join (bounded by `timeout`); queued pending tasks stay
    /// queued and resume on a later `start()`. `wait = false`: queued and
    /// time-gated tasks are cancelled and the pool is detached; workers
    /// exit after their current item without being awaited.
    pub async fn stop(&self, wait: bool, timeout: Option<Duration>) -> Result<()> {
        let (workers, scheduler) = {
            let mut state = self.core.state.lock().await;
            if !state.running {
                warn!(name = %self.core.config.name, "task queue is not running");
                return Ok(());
            }
            info!(name = %self.core.config.name, wait, "stopping task queue");
            state.running = false;

            if let Some(token) = state.shutdown.take() {
                token.cancel();
            }

            if !wait {
                let queued = state.ready.drain();
                let scheduled = std::mem::take(&mut state.scheduled);
                for id in queued.into_iter().chain(scheduled) {
                    if let Some(task) = state.tasks.get_mut(&id) {
                        if task.status.is_cancellable() {
                            task.cancel();
                        }
                    }
                }
            }

            (std::mem::take(&mut state.workers), state.scheduler.take())
        };

        let result = if wait {
            let handles: Vec<JoinHandle<()>> = workers.into_iter().chain(scheduler).collect();
            let joined = join_all(handles);
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, joined).await {
                    Ok(_) => Ok(()),
                    Err(_) => {
                        warn!(
                            name = %self.core.config.name,
                            timeout = ?limit,
                            "timed out waiting for workers to finish"
                        );
                        Err(Error::StopTimeout(limit))
                    }
                },
                None => {
                    joined.await;
                    Ok(())
                }
            }
        } else {
            // Detached: handles dropped, tasks run to completion on their own.
            self.core.task_done.notify_waiters();
            Ok(())
        };

        self.core.persist().await;
        info!(name = %self.core.config.name, "task queue stopped");
        result
    }

    /// Submit a work item.
    ///
    /// Registers dependency edges (ids the queue has never seen are
    /// allowed; readiness is re-checked lazily), parks time-gated tasks in
    /// the scheduled set, enqueues immediately-ready tasks, and leaves
    /// dependency-blocked tasks pending. Auto-starts the queue if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyCycle`] if the declared dependencies
    /// would close a cycle.
    pub async fn submit(
        &self,
        work: Arc<dyn Invocable>,
        args: Value,
        options: TaskOptions,
    ) -> Result<TaskId> {
        let task = Task::new(work, args, options);
        let id = task.id;

        let needs_start = {
            let state = &mut *self.core.state.lock().await;
            state.graph.register(id, &task.dependencies)?;

            let time_gated = task.scheduled_time.is_some();
            let ready_now = !time_gated && task.can_execute(&state.completed);
            let priority = task.priority;
            debug!(
                task = %id,
                priority,
                time_gated,
                ready_now,
                deps = task.dependencies.len(),
                "task submitted"
            );
            state.tasks.insert(id, task);

            if time_gated {
                state.scheduled.push(id);
            } else if ready_now {
                state.ready.push(id, priority);
                self.core.work_ready.notify_one();
            }

            !state.running
        };

        if needs_start {
            self.start().await;
        }

        Ok(id)
    }

    /// Cancel a task that has not started.
    ///
    /// `Ok(true)` for pending/scheduled tasks, `Ok(false)` for running or
    /// terminal ones. Unknown ids are an error.
    pub async fn cancel_task(&self, id: TaskId) -> Result<bool> {
        let cancelled = {
            let state = &mut *self.core.state.lock().await;
            let task = state
                .tasks
                .get_mut(&id)
                .ok_or(Error::TaskNotFound { id })?;

            if !task.status.is_cancellable() {
                warn!(task = %id, status = %task.status, "cannot cancel task");
                false
            } else {
                task.cancel();
                state.scheduled.retain(|t| *t != id);
                state.ready.remove(&id);
                info!(task = %id, "task cancelled");
                true
            }
        };

        if cancelled {
            self.core.task_done.notify_waiters();
            self.core.persist().await;
        }
        Ok(cancelled)
    }

    /// Current status of a task.
    pub async fn get_task_status(&self, id: TaskId) -> Result<TaskStatus> {
        let state = self.core.state.lock().await;
        state
            .tasks
            .get(&id)
            .map(|task| task.status)
            .ok_or(Error::TaskNotFound { id })
    }

    /// Outcome of a task; `None` until it reaches a terminal status.
    pub async fn get_task_result(&self, id: TaskId) -> Result<Option<TaskResult>> {
        let state = self.core.state.lock().await;
        state
            .tasks
            .get(&id)
            .map(|task| task.result.clone())
            .ok_or(Error::TaskNotFound { id })
    }

    /// Block until the task reaches a terminal status.
    ///
    /// `Ok(None)` is the timeout sentinel; task state is never mutated.
    pub async fn wait_for_task(
        &self,
        id: TaskId,
        timeout: Option<Duration>,
    ) -> Result<Option<TaskResult>> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

        loop {
            // Register for the wakeup before checking, so a transition
            // between the check and the await is not missed.
            let notified = self.core.task_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.core.state.lock().await;
                let task = state.tasks.get(&id).ok_or(Error::TaskNotFound { id })?;
                if task.status.is_terminal() {
                    return Ok(task.result.clone());
                }
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        debug!(task = %id, "timed out waiting for task");
                        return Ok(None);
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Point-in-time queue statistics.
    pub async fn stats(&self) -> QueueStats {
        let state = self.core.state.lock().await;
        QueueStats::collect(
            &state.tasks,
            state.ready.len(),
            state.running,
            self.core.config.max_workers,
        )
    }

    /// Evict all terminal tasks from the table. Memory reclamation only:
    /// the completed-id set (and thus persisted history and dependency
    /// readiness) is unaffected.
    pub async fn clear_completed(&self) -> usize {
        let cleared = {
            let state = &mut *self.core.state.lock().await;
            let ids: Vec<TaskId> = state
                .tasks
                .iter()
                .filter(|(_, task)| task.is_terminal())
                .map(|(id, _)| *id)
                .collect();
            for id in &ids {
                state.tasks.remove(id);
                state.graph.remove(id);
            }
            ids.len()
        };

        info!(name = %self.core.config.name, cleared, "cleared terminal tasks");
        self.core.persist().await;
        cleared
    }

    /// Whether the worker pool is up.
    pub async fn is_running(&self) -> bool {
        self.core.state.lock().await.running
    }

    /// The queue's configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.core.config
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.core.config.name)
            .field("mode", &self.core.config.mode)
            .field("max_workers", &self.core.config.max_workers)
            .finish()
    }
}
