//! The invocable work abstraction.
//!
//! The queue treats every payload opaquely: anything that implements
//! [`Invocable`] can be submitted, whether it wraps a closure, a bound
//! method, or an external API call. The queue never inspects what the work
//! does; it only observes the outcome.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::task::TaskId;

/// Failure returned by a work item.
///
/// The `retryable` flag is decided by the work itself (or the code that
/// wraps it), not by inspecting error types downstream: a transient error
/// is retried up to the task's retry budget, a fatal one fails the task on
/// the spot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct WorkError {
    message: String,
    retryable: bool,
}

impl WorkError {
    /// A failure worth retrying (timeouts, connection resets, rate limits).
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that no retry will fix (bad input, missing resource).
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An opaque unit of schedulable work.
///
/// `execute` receives the arguments captured at submit time and returns
/// either a JSON value or a [`WorkError`]. Implementations must tolerate
/// being called more than once: a retried task re-executes the same
/// instance.
#[async_trait]
pub trait Invocable: Send + Sync {
    async fn execute(&self, args: &Value) -> Result<Value, WorkError>;
}

/// Observer invoked with `(task_id, fraction)` when a task makes progress.
pub type ProgressFn = Arc<dyn Fn(TaskId, f64) + Send + Sync>;

struct FnWork<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Invocable for FnWork<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, WorkError>> + Send + 'static,
{
    async fn execute(&self, args: &Value) -> Result<Value, WorkError> {
        (self.f)(args.clone()).await
    }
}

/// Wrap an async closure as an [`Invocable`].
///
/// The closure receives an owned copy of the submit-time arguments on every
/// attempt.
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn Invocable>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, WorkError>> + Send + 'static,
{
    Arc::new(FnWork { f })
}

/// Wrap a constant payload as an [`Invocable`] that always succeeds.
pub fn from_value(value: Value) -> Arc<dyn Invocable> {
    from_fn(move |_args| {
        let value = value.clone();
        async move { Ok(value) }
    })
}
