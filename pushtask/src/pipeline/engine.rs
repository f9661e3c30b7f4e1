//! Routine execution engine.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::model::{PipelineId, Routine, RoutineId, RoutineStatus};
use super::orchestrator::PipelineOrchestrator;
use super::tasks::{routine_kwargs, ROUTINE_TASK};
use crate::dispatch::Dispatcher;
use crate::errors::PushtaskError;
use crate::tasks::TaskContext;

/// Which branch an execution took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineOutcome {
    /// The routine had already completed; nothing changed.
    AlreadyCompleted,
    /// The routine is being or has been reverted; nothing changed.
    Skipped,
    /// Retries are used up; the pipeline is being reverted.
    Exhausted,
    /// The task succeeded.
    Completed,
    /// The task failed and another attempt was enqueued.
    RetryScheduled,
}

/// Work dispatched once the routine lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowUp {
    Next(RoutineId),
    Retry(RoutineId),
    RevertPipeline(PipelineId),
}

/// Runs one attempt of a routine under its lock.
#[derive(Debug, Clone)]
pub struct RoutineEngine {
    pipelines: PipelineOrchestrator,
}

impl RoutineEngine {
    /// Creates an engine over the orchestrator's store and locks.
    #[must_use]
    pub fn new(pipelines: PipelineOrchestrator) -> Self {
        Self { pipelines }
    }

    /// Processes one delivery of `routine_id`.
    ///
    /// Task failures are absorbed into the routine's state and retry
    /// accounting. Lock, store, queue and lookup failures propagate so the
    /// queue redelivers the invocation. Follow-up work lost to a failed push
    /// is dispatched again on redelivery: a completed routine re-dispatches
    /// its successor while that one is still `scheduled`, and an exhausted
    /// routine resumes the pipeline revert.
    pub async fn execute(
        &self,
        dispatcher: &Dispatcher,
        routine_id: RoutineId,
    ) -> Result<RoutineOutcome, PushtaskError> {
        let guard = self.pipelines.lock_routine(routine_id).await?;
        let (outcome, follow_up) = self.transition(dispatcher, routine_id).await?;
        guard.release();

        match follow_up {
            Some(FollowUp::Next(next_id)) => {
                debug!(routine_id = %routine_id, next_routine_id = %next_id, "Dispatching next routine");
                dispatcher.delay(ROUTINE_TASK, routine_kwargs(next_id)).await?;
            }
            Some(FollowUp::Retry(id)) => {
                // Logged first: in eager mode the retry runs inside `delay`.
                info!(routine_id = %id, "Routine #{id} has been enqueued for retry");
                dispatcher.delay(ROUTINE_TASK, routine_kwargs(id)).await?;
            }
            Some(FollowUp::RevertPipeline(pipeline_id)) => {
                self.pipelines.revert(dispatcher, pipeline_id).await?;
            }
            None => {}
        }
        Ok(outcome)
    }

    async fn transition(
        &self,
        dispatcher: &Dispatcher,
        routine_id: RoutineId,
    ) -> Result<(RoutineOutcome, Option<FollowUp>), PushtaskError> {
        let store = self.pipelines.store();
        let mut routine = store.get_routine(routine_id).await?;
        let id = routine.id;

        match routine.status {
            RoutineStatus::Completed => {
                info!(routine_id = %id, "Routine #{id} is already completed");
                // A failed push of the next routine must not stall the pipeline.
                let next = store
                    .next_routine(routine.pipeline_id, routine.position)
                    .await?
                    .filter(|r| r.status == RoutineStatus::Scheduled);
                return Ok((RoutineOutcome::AlreadyCompleted, next.map(|r| FollowUp::Next(r.id))));
            }
            RoutineStatus::Reverting if routine.output.is_none() => {
                debug!(routine_id = %id, "Routine exhausted its retries, resuming pipeline revert");
                return Ok((
                    RoutineOutcome::Exhausted,
                    Some(FollowUp::RevertPipeline(routine.pipeline_id)),
                ));
            }
            RoutineStatus::Reverting | RoutineStatus::Reverted => {
                debug!(routine_id = %id, status = %routine.status, "Routine is reverting, skipping");
                return Ok((RoutineOutcome::Skipped, None));
            }
            RoutineStatus::Scheduled | RoutineStatus::Running | RoutineStatus::Failed => {}
        }

        if routine.retries_exhausted() {
            return self.escalate(routine).await;
        }

        let binding = dispatcher.registry().get(&routine.task_name)?;

        routine.attempt_count += 1;
        routine.status = RoutineStatus::Running;
        routine.starts_at = Some(self.pipelines.clock().now());
        store.save_routine(&routine).await?;
        info!(routine_id = %id, task = %routine.task_name, "Routine #{id} is running");

        let ctx = TaskContext::new(dispatcher, binding.name());
        match binding.run(&ctx, routine.body.clone()).await {
            Ok(output) => {
                routine.output = Some(output);
                routine.status = RoutineStatus::Completed;
                routine.ends_at = Some(self.pipelines.clock().now());
                store.save_routine(&routine).await?;
                info!(routine_id = %id, task = %routine.task_name, "Routine #{id} just completed");

                let next = store
                    .next_routine(routine.pipeline_id, routine.position)
                    .await?;
                Ok((RoutineOutcome::Completed, next.map(|r| FollowUp::Next(r.id))))
            }
            Err(error) => {
                routine.status = RoutineStatus::Failed;
                store.save_routine(&routine).await?;
                info!(
                    routine_id = %id,
                    task = %routine.task_name,
                    attempt = routine.attempt_count,
                    error = %error,
                    "Routine #{id} has failed"
                );

                if routine.can_retry() {
                    Ok((RoutineOutcome::RetryScheduled, Some(FollowUp::Retry(id))))
                } else {
                    self.escalate(routine).await
                }
            }
        }
    }

    async fn escalate(
        &self,
        mut routine: Routine,
    ) -> Result<(RoutineOutcome, Option<FollowUp>), PushtaskError> {
        let id = routine.id;
        routine.status = RoutineStatus::Reverting;
        self.pipelines.store().save_routine(&routine).await?;
        info!(
            routine_id = %id,
            attempts = routine.attempt_count,
            max_retries = routine.max_retries,
            "Routine #{id} has exhausted retries and is being reverted"
        );
        Ok((
            RoutineOutcome::Exhausted,
            Some(FollowUp::RevertPipeline(routine.pipeline_id)),
        ))
    }
}
