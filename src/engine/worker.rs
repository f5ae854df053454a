//! Worker loop: drains the ready queue and executes tasks.
//!
//! User work and backoff sleeps run outside the state lock, so a slow or
//! retrying task never blocks submit/cancel/stat queries on other tasks. A
//! retry occupies its worker slot for the full backoff + re-execution: this
//! keeps the task's whole attempt history on one worker at the cost of pool
//! throughput under flaky work.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::task::{TaskId, TaskResult, TaskStatus};
use crate::engine::queue::QueueCore;
use crate::engine::retry::RetryPolicy;

pub(crate) async fn run(core: Arc<QueueCore>, shutdown: CancellationToken, index: usize) {
    debug!(worker = index, "worker started");
    loop {
        let task_id = loop {
            if shutdown.is_cancelled() {
                debug!(worker = index, "worker stopped");
                return;
            }
            let next = { core.state.lock().await.ready.pop() };
            if let Some(id) = next {
                break id;
            }
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(worker = index, "worker stopped");
                    return;
                }
                _ = core.work_ready.notified() => {}
            }
        };
        execute(&core, task_id).await;
    }
}

/// Run one task to a terminal status, retrying in place.
async fn execute(core: &Arc<QueueCore>, id: TaskId) {
    // Claim the task. Anything no longer pending (cancelled while queued,
    // or already picked up) is skipped.
    let claimed = {
        let state = &mut *core.state.lock().await;
        match state.tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.begin_attempt();
                Some((
                    Arc::clone(&task.work),
                    task.args.clone(),
                    RetryPolicy::new(task.max_retries, task.retry_delay),
                ))
            }
            Some(task) => {
                debug!(task = %id, status = %task.status, "skipping task no longer pending");
                None
            }
            None => None,
        }
    };
    let Some((work, args, policy)) = claimed else {
        return;
    };

    let mut attempts = 1u32;
    loop {
        info!(
            task = %id,
            attempt = attempts,
            max_attempts = policy.max_attempts(),
            "executing task"
        );
        let started = Instant::now();
        let outcome = work.execute(&args).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(value) => {
                complete(core, id, value, elapsed).await;
                return;
            }
            Err(err) if policy.should_retry(attempts, &err) => {
                let delay = policy.delay_for(attempts);
                warn!(
                    task = %id,
                    attempt = attempts,
                    error = %err,
                    delay = ?delay,
                    "attempt failed, retrying"
                );
                {
                    let mut state = core.state.lock().await;
                    if let Some(task) = state.tasks.get_mut(&id) {
                        task.mark_retrying();
                    }
                }
                tokio::time::sleep(delay).await;
                {
                    let mut state = core.state.lock().await;
                    if let Some(task) = state.tasks.get_mut(&id) {
                        task.begin_attempt();
                    }
                }
                attempts += 1;
            }
            Err(err) => {
                error!(task = %id, attempts, error = %err, "task failed");
                {
                    let mut state = core.state.lock().await;
                    if let Some(task) = state.tasks.get_mut(&id) {
                        task.fail(TaskResult::failure(err.to_string(), elapsed));
                    }
                }
                core.task_done.notify_waiters();
                core.persist().await;
                return;
            }
        }
    }
}

/// Record a success and trigger dependents that became ready.
async fn complete(core: &Arc<QueueCore>, id: TaskId, value: Value, elapsed: Duration) {
    let (progress, woken) = {
        let state = &mut *core.state.lock().await;
        if let Some(task) = state.tasks.get_mut(&id) {
            task.complete(TaskResult::success(value, elapsed));
        }
        state.completed.insert(id);

        // Event-driven trigger: re-check every registered dependent now.
        // Time-gated dependents stay with the scheduler loop.
        let mut eligible = Vec::new();
        for dep_id in state.graph.dependents(&id) {
            if let Some(dep) = state.tasks.get(&dep_id) {
                if dep.status == TaskStatus::Pending && dep.can_execute(&state.completed) {
                    eligible.push((dep_id, dep.priority));
                }
            }
        }
        let mut woken = 0;
        for (dep_id, priority) in eligible {
            if state.ready.push(dep_id, priority) {
                debug!(task = %dep_id, "dependencies satisfied, task enqueued");
                woken += 1;
            }
        }

        let progress = state.tasks.get(&id).and_then(|t| t.progress.clone());
        (progress, woken)
    };

    for _ in 0..woken {
        core.work_ready.notify_one();
    }
    info!(task = %id, elapsed = ?elapsed, "task completed");
    if let Some(cb) = progress {
        cb(id, 1.0);
    }
    core.task_done.notify_waiters();
    core.persist().await;
}
