//! Error types for the pool executor
//!
//! Two families:
//! - [`ExecutorError`] - returned synchronously by the executor itself
//! - [`TaskError`] - attached to a [`ResultHandle`](crate::ResultHandle) and
//!   surfaced only when the handle is read

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Executor-level errors
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Submission attempted while the executor is not running
    #[error("executor is not running")]
    NotRunning,

    /// Bounded queue is at capacity
    #[error("work queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// `start` called on a running executor
    #[error("executor is already running")]
    AlreadyRunning,

    /// `start` called after shutdown; executors are not restartable
    #[error("executor has been shut down and cannot be restarted")]
    Stopped,

    /// `start` called outside a tokio runtime
    #[error("no tokio runtime available to spawn workers: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Per-item failure recorded on a result handle
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The callable returned an error
    #[error("task failed: {0}")]
    Failed(Arc<anyhow::Error>),

    /// The callable panicked
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The item was discarded before it could complete
    #[error("task was cancelled")]
    Cancelled,

    /// The outcome was already moved out through another handle
    #[error("task result was already taken")]
    Taken,
}

impl TaskError {
    /// Wrap an error returned by a callable
    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        Self::Failed(Arc::new(error.into()))
    }

    /// Build from a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::Panicked(panic_message(payload.as_ref()))
    }

    /// Whether this is the cancellation state rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The original error returned by the callable, if any
    pub fn failure(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Downcast the original error to a concrete type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.failure().and_then(|error| error.downcast_ref::<E>())
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("boom: {0}")]
    struct Boom(u32);

    #[test]
    fn test_failed_keeps_original_error() {
        let error = TaskError::failed(Boom(7));

        assert!(!error.is_cancelled());
        assert_eq!(error.downcast_ref::<Boom>(), Some(&Boom(7)));
        assert_eq!(error.to_string(), "task failed: boom: 7");
    }

    #[test]
    fn test_cancelled_is_not_a_failure() {
        let error = TaskError::Cancelled;

        assert!(error.is_cancelled());
        assert!(error.failure().is_none());
    }

    #[test]
    fn test_panic_payloads() {
        let from_str = TaskError::from_panic(Box::new("static message"));
        let from_string = TaskError::from_panic(Box::new(String::from("owned message")));
        let opaque = TaskError::from_panic(Box::new(42_u8));

        assert!(matches!(from_str, TaskError::Panicked(m) if m == "static message"));
        assert!(matches!(from_string, TaskError::Panicked(m) if m == "owned message"));
        assert!(matches!(opaque, TaskError::Panicked(m) if m == "unknown panic payload"));
    }

    #[test]
    fn test_queue_full_message() {
        let error = ExecutorError::QueueFull { capacity: 3 };
        assert_eq!(error.to_string(), "work queue is full (capacity 3)");
    }
}
