//! In-process task queue for background job processing.
//!
//! `conveyor` schedules opaque work items through a priority or FIFO
//! ready queue drained by a bounded pool of workers. Tasks can declare
//! dependencies on other tasks, a time gate, and a retry budget with
//! exponential backoff; queue metadata can be snapshotted to disk so the
//! completed-id set survives a restart.
//!
//! # Example
//!
//! ```no_run
//! use conveyor::{from_fn, QueueConfig, TaskOptions, TaskQueue};
//! use serde_json::json;
//!
//! # async fn demo() -> conveyor::Result<()> {
//! let queue = TaskQueue::new(QueueConfig::new("jobs"));
//!
//! let work = from_fn(|args: serde_json::Value| async move {
//!     let n = args["n"].as_i64().unwrap_or(0);
//!     Ok(json!(n * 2))
//! });
//!
//! let id = queue.submit(work, json!({ "n": 21 }), TaskOptions::new()).await?;
//! let result = queue.wait_for_task(id, None).await?;
//! assert!(result.unwrap().success);
//!
//! queue.stop(true, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod logging;

pub use crate::config::{QueueConfig, QueueMode};
pub use crate::core::task::{Schedule, TaskId, TaskOptions, TaskResult, TaskStatus};
pub use crate::core::work::{from_fn, from_value, Invocable, ProgressFn, WorkError};
pub use crate::engine::persist::{Snapshot, TaskRecord};
pub use crate::engine::queue::TaskQueue;
pub use crate::engine::retry::RetryPolicy;
pub use crate::engine::stats::QueueStats;
pub use crate::error::{Error, Result};
