//! Aggregated per-status counters.

use serde::Serialize;
use std::collections::HashMap;

use crate::core::task::{Task, TaskId, TaskStatus};

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Tasks currently held in the table (terminal included until cleared).
    pub total_tasks: usize,
    pub pending: usize,
    pub scheduled: usize,
    pub running: usize,
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Tasks sitting in the ready queue.
    pub queue_depth: usize,
    /// Whether the worker pool is up.
    pub is_running: bool,
    /// Configured pool size.
    pub max_workers: usize,
}

impl QueueStats {
    pub(crate) fn collect(
        tasks: &HashMap<TaskId, Task>,
        queue_depth: usize,
        is_running: bool,
        max_workers: usize,
    ) -> Self {
        let mut stats = Self {
            total_tasks: tasks.len(),
            queue_depth,
            is_running,
            max_workers,
            ..Self::default()
        };

        for task in tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Scheduled => stats.scheduled += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Retrying => stats.retrying += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }

        stats
    }
}
