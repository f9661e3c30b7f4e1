//! Error types for pushtask.
//!
//! Every collaborator contract has its own error enum; [`PushtaskError`]
//! unifies them for the dispatcher, the pipeline orchestrator and the
//! routine engines.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pushtask operations.
#[derive(Debug, Error)]
pub enum PushtaskError {
    /// No task is registered under the requested name.
    #[error("{0}")]
    TaskNotFound(#[from] TaskNotFound),

    /// A `later` call received a schedule it cannot interpret.
    #[error("{0}")]
    UnsupportedSchedule(#[from] UnsupportedScheduleError),

    /// The queue collaborator rejected a push.
    #[error("{0}")]
    Queue(#[from] QueueError),

    /// The per-routine lock could not be acquired.
    #[error("{0}")]
    Lock(#[from] LockError),

    /// The routine store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Registry construction failed.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A task executed in-process returned an error.
    #[error("Task {task} failed: {source}")]
    TaskFailed {
        /// The task name.
        task: String,
        /// The error returned by the task.
        #[source]
        source: TaskError,
    },

    /// A revert was requested for a task that cannot revert.
    #[error("Task {task} does not support revert")]
    NotRevertible {
        /// The task name.
        task: String,
    },

    /// A pushed payload could not be interpreted as keyword arguments.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PushtaskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl PushtaskError {
    /// Returns true if the queue's redelivery should re-attempt the invocation.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Lock(_) | Self::Queue(_) | Self::Store(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let kind = match self {
            Self::TaskNotFound(_) => "TaskNotFound",
            Self::UnsupportedSchedule(_) => "UnsupportedScheduleError",
            Self::Queue(_) => "QueueError",
            Self::Lock(_) => "LockError",
            Self::Store(_) => "StoreError",
            Self::Registry(_) => "RegistryError",
            Self::Config(_) => "ConfigError",
            Self::TaskFailed { .. } => "TaskFailed",
            Self::NotRevertible { .. } => "NotRevertible",
            Self::InvalidPayload(_) => "InvalidPayload",
            Self::Serialization(_) => "SerializationError",
        };

        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("transient".to_string(), serde_json::json!(self.is_transient()));
        map
    }
}

/// Error raised when looking up an unregistered task name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task not found: {name}")]
pub struct TaskNotFound {
    /// The requested name.
    pub name: String,
}

impl TaskNotFound {
    /// Creates a new task not found error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Error raised when `later` receives a `when` it cannot schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported schedule: {received}")]
pub struct UnsupportedScheduleError {
    /// Description of the rejected input.
    pub received: String,
}

impl UnsupportedScheduleError {
    /// Creates a new unsupported schedule error.
    #[must_use]
    pub fn new(received: impl Into<String>) -> Self {
        Self {
            received: received.into(),
        }
    }
}

/// Errors reported by the queue collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was deleted recently and cannot be recreated yet.
    #[error("Queue {queue_name} was deleted recently")]
    DeletedRecently {
        /// The queue name.
        queue_name: String,
    },

    /// The queue does not exist.
    #[error("Queue {queue_name} not found")]
    NotFound {
        /// The queue name.
        queue_name: String,
    },

    /// Any other push failure.
    #[error("Push to {queue_name} failed: {reason}")]
    Push {
        /// The queue name.
        queue_name: String,
        /// The reason for failure.
        reason: String,
    },
}

impl QueueError {
    /// Creates a deleted-recently error.
    #[must_use]
    pub fn deleted_recently(queue_name: impl Into<String>) -> Self {
        Self::DeletedRecently {
            queue_name: queue_name.into(),
        }
    }

    /// Creates a generic push error.
    #[must_use]
    pub fn push(queue_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Push {
            queue_name: queue_name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for the deleted-within-retention-window condition.
    #[must_use]
    pub fn is_deleted_recently(&self) -> bool {
        matches!(self, Self::DeletedRecently { .. })
    }
}

/// Errors reported by a lock provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The lock is held elsewhere and the blocking wait elapsed.
    #[error("Could not acquire lock {key} within {waited_ms}ms")]
    Timeout {
        /// The lock key.
        key: String,
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// The provider itself failed.
    #[error("Lock provider error for {key}: {reason}")]
    Provider {
        /// The lock key.
        key: String,
        /// The reason for failure.
        reason: String,
    },
}

/// Errors reported by a routine store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No routine with this id.
    #[error("Routine #{0} not found")]
    RoutineNotFound(i64),

    /// No pipeline with this id.
    #[error("Pipeline #{0} not found")]
    PipelineNotFound(i64),

    /// Backend failure.
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Errors raised while building a task registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is already registered, possibly in another category.
    #[error("Task {name} is already registered as {existing}")]
    Duplicate {
        /// The task name.
        name: String,
        /// The category it was first registered under.
        existing: String,
    },

    /// The name is not a valid task name.
    #[error("Invalid task name: {0:?}")]
    InvalidName(String),
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field holds an invalid value.
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// The field name.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The configuration source could not be read.
    #[error("Could not read configuration: {0}")]
    Read(String),
}

impl ConfigError {
    /// Creates an invalid-field error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by task implementations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The keyword arguments do not match what the task expects.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The task failed.
    #[error("{0}")]
    Failed(String),

    /// The task hit a pushtask runtime error (built-in pipeline tasks).
    #[error(transparent)]
    Runtime(Box<PushtaskError>),

    /// Any other application error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Creates a failure with a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Creates an invalid-arguments error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }
}

impl From<PushtaskError> for TaskError {
    fn from(err: PushtaskError) -> Self {
        Self::Runtime(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_schedule_message() {
        let err = UnsupportedScheduleError::new("\"potato\"");
        assert!(err.to_string().contains("Unsupported schedule"));
    }

    #[test]
    fn test_queue_error_deleted_recently() {
        let err = QueueError::deleted_recently("tasks");
        assert!(err.is_deleted_recently());
        assert!(!QueueError::push("tasks", "boom").is_deleted_recently());
        assert_eq!(err.to_string(), "Queue tasks was deleted recently");
    }

    #[test]
    fn test_pushtask_error_to_dict() {
        let err = PushtaskError::from(TaskNotFound::new("PotatoTask"));
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "TaskNotFound");
        assert_eq!(dict.get("message").unwrap(), "Task not found: PotatoTask");
        assert_eq!(dict.get("transient").unwrap(), false);
    }

    #[test]
    fn test_lock_error_is_transient() {
        let err = PushtaskError::from(LockError::Timeout {
            key: "lock-PipelineRoutineTask-1".to_string(),
            waited_ms: 5000,
        });
        assert!(err.is_transient());
    }

    #[test]
    fn test_task_error_wraps_runtime_error() {
        let err = TaskError::from(PushtaskError::from(StoreError::RoutineNotFound(7)));
        assert_eq!(err.to_string(), "Routine #7 not found");
    }
}
