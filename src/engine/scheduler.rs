//! Scheduler loop: promotes time-gated tasks once they are due.
//!
//! Runs on a short fixed tick. Promotion requires both the time gate and
//! the dependency set to be satisfied; a due task with unmet dependencies
//! keeps being scanned on later ticks. The loop only exits on shutdown.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::task::TaskStatus;
use crate::engine::queue::QueueCore;

pub(crate) async fn run(core: Arc<QueueCore>, shutdown: CancellationToken) {
    let tick = core.config.scheduler_tick();
    debug!(tick = ?tick, "scheduler loop started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("scheduler loop stopped");
                return;
            }
            _ = tokio::time::sleep(tick) => {}
        }
        promote_due(&core).await;
    }
}

/// Move due, dependency-satisfied tasks from the scheduled set into the
/// ready queue.
async fn promote_due(core: &Arc<QueueCore>) {
    let now = Utc::now();
    let promoted = {
        let state = &mut *core.state.lock().await;
        let mut keep = Vec::with_capacity(state.scheduled.len());
        let mut promoted = 0usize;

        for id in std::mem::take(&mut state.scheduled) {
            let Some(task) = state.tasks.get_mut(&id) else {
                // Removed by clear_completed; drop the stale entry.
                continue;
            };
            if task.status != TaskStatus::Scheduled {
                continue;
            }
            if task.is_due(now) && task.can_execute(&state.completed) {
                task.promote();
                let priority = task.priority;
                state.ready.push(id, priority);
                promoted += 1;
                debug!(task = %id, "scheduled task promoted");
            } else {
                keep.push(id);
            }
        }

        state.scheduled = keep;
        promoted
    };

    for _ in 0..promoted {
        core.work_ready.notify_one();
    }
}
