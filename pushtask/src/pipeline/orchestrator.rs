//! Pipeline creation, start and revert.

use std::sync::Arc;
use tracing::debug;

use super::model::{Pipeline, PipelineId, PipelineSpec, PipelineStatus, Routine, RoutineId, RoutineStatus};
use super::tasks::{routine_kwargs, ROUTINE_REVERT_TASK, ROUTINE_TASK};
use crate::dispatch::Dispatcher;
use crate::errors::{PushtaskError, TaskNotFound};
use crate::lock::{
    routine_lock_key, LockGuard, LockProvider, ROUTINE_LOCK_BLOCKING_TIMEOUT, ROUTINE_LOCK_TIMEOUT,
};
use crate::store::RoutineStore;
use crate::tasks::TaskRegistry;
use crate::utils::{Clock, SystemClock};

/// Creates pipelines and drives their collective operations.
///
/// Cheap to clone; the store, lock provider and clock are shared.
#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    store: Arc<dyn RoutineStore>,
    locks: Arc<dyn LockProvider>,
    clock: Arc<dyn Clock>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator over `store` and `locks`.
    #[must_use]
    pub fn new(store: Arc<dyn RoutineStore>, locks: Arc<dyn LockProvider>) -> Self {
        Self {
            store,
            locks,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for routine timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The routine store.
    #[must_use]
    pub fn store(&self) -> &dyn RoutineStore {
        self.store.as_ref()
    }

    /// The clock.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Acquires the lock guarding every transition of `routine_id`.
    pub async fn lock_routine(&self, routine_id: RoutineId) -> Result<LockGuard, PushtaskError> {
        let guard = self
            .locks
            .acquire(
                &routine_lock_key(routine_id),
                ROUTINE_LOCK_TIMEOUT,
                ROUTINE_LOCK_BLOCKING_TIMEOUT,
            )
            .await?;
        Ok(guard)
    }

    /// Persists a new pipeline with its routines in `scheduled` status.
    ///
    /// Fails with [`PushtaskError::TaskNotFound`] if any routine names a
    /// task missing from `registry`; nothing is persisted in that case.
    pub async fn create(
        &self,
        registry: &TaskRegistry,
        spec: &PipelineSpec,
    ) -> Result<(Pipeline, Vec<Routine>), PushtaskError> {
        if let Some(unknown) = spec.routines.iter().find(|r| !registry.contains(&r.task_name)) {
            return Err(TaskNotFound::new(&unknown.task_name).into());
        }

        let (pipeline, routines) = self.store.create_pipeline(spec).await?;
        debug!(
            pipeline_id = %pipeline.id,
            routines = routines.len(),
            "Pipeline created"
        );
        Ok((pipeline, routines))
    }

    /// Dispatches the first routine of the pipeline.
    ///
    /// Returns its id, or `None` for a pipeline without routines.
    pub async fn start(
        &self,
        dispatcher: &Dispatcher,
        pipeline_id: PipelineId,
    ) -> Result<Option<RoutineId>, PushtaskError> {
        self.store.get_pipeline(pipeline_id).await?;
        let Some(first) = self.store.pipeline_routines(pipeline_id).await?.into_iter().next() else {
            return Ok(None);
        };

        debug!(pipeline_id = %pipeline_id, routine_id = %first.id, "Starting pipeline");
        dispatcher.delay(ROUTINE_TASK, routine_kwargs(first.id)).await?;
        Ok(Some(first.id))
    }

    /// Moves every completed routine to `reverting` and dispatches its revert.
    ///
    /// Routines are handled most recently completed first, each transition
    /// under that routine's lock. Routines already `reverting` with an output
    /// are dispatched again, so a revert interrupted by a failed push can be
    /// resumed by calling this again. Routines that never completed are left
    /// alone. Returns the ids dispatched for revert.
    pub async fn revert(
        &self,
        dispatcher: &Dispatcher,
        pipeline_id: PipelineId,
    ) -> Result<Vec<RoutineId>, PushtaskError> {
        let mut candidates: Vec<Routine> = self
            .store
            .pipeline_routines(pipeline_id)
            .await?
            .into_iter()
            .filter(|r| r.status == RoutineStatus::Completed || r.awaits_revert())
            .collect();
        candidates.sort_by(|a, b| {
            b.ends_at
                .cmp(&a.ends_at)
                .then_with(|| b.position.cmp(&a.position))
        });

        let mut reverting = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let _guard = self.lock_routine(candidate.id).await?;
            let mut routine = self.store.get_routine(candidate.id).await?;
            match routine.status {
                RoutineStatus::Completed => {
                    routine.status = RoutineStatus::Reverting;
                    self.store.save_routine(&routine).await?;
                }
                _ if routine.awaits_revert() => {}
                _ => continue,
            }
            reverting.push(routine.id);
        }

        debug!(
            pipeline_id = %pipeline_id,
            routines = ?reverting,
            "Reverting pipeline"
        );
        for routine_id in &reverting {
            dispatcher
                .delay(ROUTINE_REVERT_TASK, routine_kwargs(*routine_id))
                .await?;
        }
        Ok(reverting)
    }

    /// Derived status of the pipeline.
    pub async fn status(&self, pipeline_id: PipelineId) -> Result<PipelineStatus, PushtaskError> {
        self.store.get_pipeline(pipeline_id).await?;
        let routines = self.store.pipeline_routines(pipeline_id).await?;
        Ok(PipelineStatus::derive(&routines))
    }
}
