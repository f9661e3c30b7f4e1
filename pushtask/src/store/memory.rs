//! In-memory routine store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::RoutineStore;
use crate::errors::StoreError;
use crate::pipeline::{Pipeline, PipelineId, PipelineSpec, Routine, RoutineId, RoutineStatus};
use crate::utils::{Clock, SystemClock};

/// A routine store kept in process memory.
#[derive(Debug)]
pub struct InMemoryRoutineStore {
    pipelines: DashMap<PipelineId, Pipeline>,
    routines: DashMap<RoutineId, Routine>,
    next_pipeline_id: AtomicI64,
    next_routine_id: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRoutineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoutineStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping records with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            pipelines: DashMap::new(),
            routines: DashMap::new(),
            next_pipeline_id: AtomicI64::new(1),
            next_routine_id: AtomicI64::new(1),
            clock,
        }
    }

    /// Stores `routine` as is, replacing any routine with the same id.
    ///
    /// Used to seed a routine in a given state.
    pub fn put_routine(&self, routine: Routine) {
        self.routines.insert(routine.id, routine);
    }

    /// Number of stored routines.
    #[must_use]
    pub fn routine_count(&self) -> usize {
        self.routines.len()
    }
}

#[async_trait]
impl RoutineStore for InMemoryRoutineStore {
    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<(Pipeline, Vec<Routine>), StoreError> {
        let now = self.clock.now();
        let pipeline = Pipeline {
            id: PipelineId(self.next_pipeline_id.fetch_add(1, Ordering::SeqCst)),
            name: spec.name.clone(),
            created_at: now,
        };

        let mut routines = Vec::with_capacity(spec.routines.len());
        for (position, routine_spec) in (0_u32..).zip(&spec.routines) {
            let routine = Routine {
                id: RoutineId(self.next_routine_id.fetch_add(1, Ordering::SeqCst)),
                pipeline_id: pipeline.id,
                task_name: routine_spec.task_name.clone(),
                status: RoutineStatus::Scheduled,
                body: routine_spec.body.clone(),
                output: None,
                attempt_count: 0,
                max_retries: routine_spec.max_retries,
                position,
                created_at: now,
                starts_at: None,
                ends_at: None,
            };
            self.routines.insert(routine.id, routine.clone());
            routines.push(routine);
        }

        self.pipelines.insert(pipeline.id, pipeline.clone());
        Ok((pipeline, routines))
    }

    async fn get_pipeline(&self, id: PipelineId) -> Result<Pipeline, StoreError> {
        self.pipelines
            .get(&id)
            .map(|p| p.clone())
            .ok_or(StoreError::PipelineNotFound(id.0))
    }

    async fn get_routine(&self, id: RoutineId) -> Result<Routine, StoreError> {
        self.routines
            .get(&id)
            .map(|r| r.clone())
            .ok_or(StoreError::RoutineNotFound(id.0))
    }

    async fn save_routine(&self, routine: &Routine) -> Result<(), StoreError> {
        match self.routines.get_mut(&routine.id) {
            Some(mut stored) => {
                *stored = routine.clone();
                Ok(())
            }
            None => Err(StoreError::RoutineNotFound(routine.id.0)),
        }
    }

    async fn pipeline_routines(&self, id: PipelineId) -> Result<Vec<Routine>, StoreError> {
        let mut routines: Vec<Routine> = self
            .routines
            .iter()
            .filter(|entry| entry.pipeline_id == id)
            .map(|entry| entry.value().clone())
            .collect();
        routines.sort_by_key(|r| r.position);
        Ok(routines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Kwargs;
    use pretty_assertions::assert_eq;

    fn spec() -> PipelineSpec {
        PipelineSpec::new()
            .named("greetings")
            .routine("SayHelloTask", Kwargs::new())
            .routine("SayHelloTask", Kwargs::new())
            .routine_with_retries("CalculatePriceTask", Kwargs::new(), 1)
    }

    #[tokio::test]
    async fn test_create_pipeline() {
        let store = InMemoryRoutineStore::new();
        let (pipeline, routines) = store.create_pipeline(&spec()).await.unwrap();

        assert_eq!(pipeline.name.as_deref(), Some("greetings"));
        assert_eq!(routines.len(), 3);
        assert_eq!(
            routines.iter().map(|r| r.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(routines.iter().all(|r| r.status == RoutineStatus::Scheduled));
        assert!(routines.iter().all(|r| r.attempt_count == 0));
        assert_eq!(routines[2].max_retries, 1);
        assert_eq!(store.get_pipeline(pipeline.id).await.unwrap(), pipeline);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let store = InMemoryRoutineStore::new();
        let (_, routines) = store.create_pipeline(&spec()).await.unwrap();

        let mut routine = routines[0].clone();
        routine.status = RoutineStatus::Running;
        routine.attempt_count = 1;
        store.save_routine(&routine).await.unwrap();

        assert_eq!(store.get_routine(routine.id).await.unwrap(), routine);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let store = InMemoryRoutineStore::new();
        assert_eq!(
            store.get_routine(RoutineId(9)).await.unwrap_err(),
            StoreError::RoutineNotFound(9)
        );
        assert_eq!(
            store.get_pipeline(PipelineId(9)).await.unwrap_err(),
            StoreError::PipelineNotFound(9)
        );
    }

    #[tokio::test]
    async fn test_next_routine() {
        let store = InMemoryRoutineStore::new();
        let (pipeline, routines) = store.create_pipeline(&spec()).await.unwrap();

        let next = store.next_routine(pipeline.id, 0).await.unwrap().unwrap();
        assert_eq!(next.id, routines[1].id);
        assert!(store.next_routine(pipeline.id, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pipelines_are_isolated() {
        let store = InMemoryRoutineStore::new();
        let (first, _) = store.create_pipeline(&spec()).await.unwrap();
        let (second, _) = store.create_pipeline(&spec()).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.pipeline_routines(first.id).await.unwrap().len(), 3);
        assert_eq!(store.routine_count(), 6);
    }
}
