//! Core domain models for the task queue.
//!
//! This module contains the fundamental data structures used throughout
//! the engine: tasks, the invocable work abstraction, and the dependency
//! graph.

pub mod graph;
pub mod task;
pub mod work;

pub use graph::DependencyGraph;
pub use task::{Schedule, Task, TaskId, TaskOptions, TaskResult, TaskStatus};
pub use work::{from_fn, from_value, Invocable, ProgressFn, WorkError};
