//! Revert execution engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::model::{RoutineId, RoutineStatus};
use super::orchestrator::PipelineOrchestrator;
use crate::dispatch::Dispatcher;
use crate::errors::PushtaskError;
use crate::tasks::TaskContext;

/// Which branch a revert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertOutcome {
    /// The task's revert ran and the routine is now `reverted`.
    Reverted,
    /// The routine was already reverted.
    AlreadyReverted,
    /// The routine is not awaiting a revert.
    Skipped,
}

/// Compensates one routine under its lock.
#[derive(Debug, Clone)]
pub struct RevertEngine {
    pipelines: PipelineOrchestrator,
}

impl RevertEngine {
    /// Creates an engine over the orchestrator's store and locks.
    #[must_use]
    pub fn new(pipelines: PipelineOrchestrator) -> Self {
        Self { pipelines }
    }

    /// Calls the bound task's revert with the routine's stored output.
    ///
    /// A failing revert leaves the routine in `reverting` and returns the
    /// error, so the queue's redelivery attempts it again.
    pub async fn revert(
        &self,
        dispatcher: &Dispatcher,
        routine_id: RoutineId,
    ) -> Result<RevertOutcome, PushtaskError> {
        let _guard = self.pipelines.lock_routine(routine_id).await?;
        let store = self.pipelines.store();
        let mut routine = store.get_routine(routine_id).await?;
        let id = routine.id;

        match routine.status {
            RoutineStatus::Reverting => {}
            RoutineStatus::Reverted => {
                debug!(routine_id = %id, "Routine is already reverted");
                return Ok(RevertOutcome::AlreadyReverted);
            }
            status => {
                warn!(routine_id = %id, status = %status, "Routine is not reverting, ignoring revert");
                return Ok(RevertOutcome::Skipped);
            }
        }

        let binding = dispatcher.registry().get(&routine.task_name)?;
        let ctx = TaskContext::new(dispatcher, binding.name());
        let data = routine.output.clone().unwrap_or(Value::Null);
        binding.revert(&ctx, data).await?;

        routine.status = RoutineStatus::Reverted;
        store.save_routine(&routine).await?;
        info!(routine_id = %id, task = %routine.task_name, "Routine #{id} has been reverted");
        Ok(RevertOutcome::Reverted)
    }
}
