//! Pipeline and routine records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::tasks::Kwargs;
use crate::utils::Timestamp;

/// Retries granted to a routine unless its spec says otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Identifier of a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutineId(pub i64);

impl fmt::Display for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RoutineId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(pub i64);

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PipelineId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineStatus {
    /// Created, not yet attempted.
    #[default]
    Scheduled,
    /// An attempt is in progress.
    Running,
    /// The task succeeded. Terminal.
    Completed,
    /// The last attempt failed; a retry may be pending.
    Failed,
    /// Waiting for its compensating revert.
    Reverting,
    /// Compensated. Terminal.
    Reverted,
}

impl RoutineStatus {
    /// Returns true for `completed` and `reverted`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Reverted)
    }

    /// Returns true while the routine may still be executed.
    #[must_use]
    pub fn is_executable(self) -> bool {
        matches!(self, Self::Scheduled | Self::Running | Self::Failed)
    }
}

impl fmt::Display for RoutineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Reverting => "reverting",
            Self::Reverted => "reverted",
        };
        f.write_str(s)
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    /// Routine id.
    pub id: RoutineId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Name of the bound task.
    pub task_name: String,
    /// Current state.
    pub status: RoutineStatus,
    /// Keyword arguments passed to the task.
    pub body: Kwargs,
    /// Task result, set on completion.
    pub output: Option<Value>,
    /// Attempts started so far.
    pub attempt_count: u32,
    /// Attempts allowed beyond the first before the pipeline is reverted.
    pub max_retries: u32,
    /// Position within the pipeline, from zero.
    pub position: u32,
    /// Creation time.
    pub created_at: Timestamp,
    /// Start of the latest attempt.
    pub starts_at: Option<Timestamp>,
    /// Completion time.
    pub ends_at: Option<Timestamp>,
}

impl Routine {
    /// Returns true once every allowed attempt has been used.
    #[must_use]
    pub fn retries_exhausted(&self) -> bool {
        self.attempt_count > self.max_retries
    }

    /// Returns true if a failed attempt may be retried.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.attempt_count <= self.max_retries
    }

    /// Returns true if the routine completed and its compensation is pending.
    ///
    /// A routine moved to `reverting` because it exhausted its retries never
    /// produced output and has nothing to compensate.
    #[must_use]
    pub fn awaits_revert(&self) -> bool {
        self.status == RoutineStatus::Reverting && self.output.is_some()
    }
}

/// An ordered group of routines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline id.
    pub id: PipelineId,
    /// Optional label.
    pub name: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Overall state of a pipeline, derived from its routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// No routine has started.
    Pending,
    /// Work is in progress.
    Running,
    /// Every routine completed.
    Completed,
    /// A routine failed and awaits its retry.
    Failed,
    /// Compensation is in progress.
    Reverting,
    /// Compensation finished.
    Reverted,
}

impl PipelineStatus {
    /// Derives the status of a pipeline from its routines.
    #[must_use]
    pub fn derive(routines: &[Routine]) -> Self {
        let any = |status: RoutineStatus| routines.iter().any(|r| r.status == status);

        let compensating = any(RoutineStatus::Reverted) || any(RoutineStatus::Reverting);

        if routines.iter().any(Routine::awaits_revert) || (compensating && any(RoutineStatus::Completed)) {
            Self::Reverting
        } else if compensating {
            Self::Reverted
        } else if any(RoutineStatus::Failed) {
            Self::Failed
        } else if routines.is_empty() || routines.iter().all(|r| r.status == RoutineStatus::Scheduled) {
            Self::Pending
        } else if routines.iter().all(|r| r.status == RoutineStatus::Completed) {
            Self::Completed
        } else {
            Self::Running
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Reverting => "reverting",
            Self::Reverted => "reverted",
        };
        f.write_str(s)
    }
}

/// One routine of a [`PipelineSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineSpec {
    /// Name of the task to run.
    pub task_name: String,
    /// Keyword arguments.
    #[serde(default)]
    pub body: Kwargs,
    /// Retry budget.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// Description of a pipeline to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Optional label.
    #[serde(default)]
    pub name: Option<String>,
    /// Routines, in execution order.
    pub routines: Vec<RoutineSpec>,
}

impl PipelineSpec {
    /// Creates an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the label.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a routine with the default retry budget.
    #[must_use]
    pub fn routine(self, task_name: impl Into<String>, body: Kwargs) -> Self {
        self.routine_with_retries(task_name, body, DEFAULT_MAX_RETRIES)
    }

    /// Appends a routine with an explicit retry budget.
    #[must_use]
    pub fn routine_with_retries(
        mut self,
        task_name: impl Into<String>,
        body: Kwargs,
        max_retries: u32,
    ) -> Self {
        self.routines.push(RoutineSpec {
            task_name: task_name.into(),
            body,
            max_retries,
        });
        self
    }
}
