//! Routine and pipeline persistence.

mod memory;

pub use memory::InMemoryRoutineStore;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::pipeline::{Pipeline, PipelineId, PipelineSpec, Routine, RoutineId};

/// Durable storage for pipelines and their routines.
///
/// Reads always return the latest persisted state, so an engine holding a
/// routine's lock sees every transition made before it.
#[async_trait]
pub trait RoutineStore: Send + Sync + std::fmt::Debug {
    /// Persists a pipeline and one `scheduled` routine per spec entry.
    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<(Pipeline, Vec<Routine>), StoreError>;

    /// Loads a pipeline.
    async fn get_pipeline(&self, id: PipelineId) -> Result<Pipeline, StoreError>;

    /// Loads a routine.
    async fn get_routine(&self, id: RoutineId) -> Result<Routine, StoreError>;

    /// Overwrites a routine with `routine`.
    async fn save_routine(&self, routine: &Routine) -> Result<(), StoreError>;

    /// Routines of a pipeline, ordered by position.
    async fn pipeline_routines(&self, id: PipelineId) -> Result<Vec<Routine>, StoreError>;

    /// The routine following `position` in its pipeline, if any.
    async fn next_routine(
        &self,
        pipeline_id: PipelineId,
        position: u32,
    ) -> Result<Option<Routine>, StoreError> {
        Ok(self
            .pipeline_routines(pipeline_id)
            .await?
            .into_iter()
            .find(|r| r.position > position))
    }
}
