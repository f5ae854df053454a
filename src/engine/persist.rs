//! Best-effort metadata snapshot.
//!
//! The snapshot captures task metadata and the completed-id set, never the
//! work items, which have no durable representation. On reload only the
//! completed set is restored: a task that was pending or running when the
//! process died has lost its work-item reference and must be resubmitted
//! by the caller. The snapshot guarantees recovery of "what already
//! finished", not "what was in flight".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::{QueueConfig, QueueMode};
use crate::core::task::{Task, TaskId, TaskResult, TaskStatus};
use crate::error::Result;

/// Serializable projection of a task: everything except the work item and
/// the progress callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub priority: i64,
    pub status: TaskStatus,
    pub max_retries: u32,
    pub attempts: u32,
    pub retry_delay: Duration,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub dependencies: HashSet<TaskId>,
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            priority: task.priority,
            status: task.status,
            max_retries: task.max_retries,
            attempts: task.attempts,
            retry_delay: task.retry_delay,
            scheduled_time: task.scheduled_time,
            dependencies: task.dependencies.clone(),
            result: task.result.clone(),
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            metadata: task.metadata.clone(),
        }
    }
}

/// Full queue snapshot written after lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub mode: QueueMode,
    pub tasks: Vec<TaskRecord>,
    pub completed: HashSet<TaskId>,
    pub saved_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture the current queue state.
    pub(crate) fn capture(
        config: &QueueConfig,
        tasks: &HashMap<TaskId, Task>,
        completed: &HashSet<TaskId>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            mode: config.mode,
            tasks: tasks.values().map(TaskRecord::from).collect(),
            completed: completed.clone(),
            saved_at: Utc::now(),
        }
    }

    /// Write the snapshot as pretty JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), tasks = self.tasks.len(), "snapshot written");
        Ok(())
    }

    /// Read a snapshot; `Ok(None)` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let snapshot: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        debug!(
            path = %path.display(),
            completed = snapshot.completed.len(),
            "snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}
