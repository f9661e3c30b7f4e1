//! Application wiring.
//!
//! A [`TaskApp`] owns the registry, the dispatcher and the pipeline
//! orchestrator, built once at startup from a [`TaskAppBuilder`].

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::TaskConfig;
use crate::dispatch::{Dispatched, Dispatcher, IntoSchedule};
use crate::errors::PushtaskError;
use crate::lock::{InMemoryLockProvider, LockProvider};
use crate::pipeline::{
    pipeline_bindings, Pipeline, PipelineId, PipelineOrchestrator, PipelineSpec, PipelineStatus,
    Routine, RoutineId,
};
use crate::queue::{InMemoryQueue, QueueClient};
use crate::store::{InMemoryRoutineStore, RoutineStore};
use crate::tasks::{Kwargs, TaskBinding, TaskRegistry};
use crate::utils::{Clock, SystemClock};

/// Builder for [`TaskApp`].
///
/// Collaborators left unset fall back to the in-memory implementations.
#[derive(Default)]
pub struct TaskAppBuilder {
    config: TaskConfig,
    bindings: Vec<TaskBinding>,
    queue: Option<Arc<dyn QueueClient>>,
    store: Option<Arc<dyn RoutineStore>>,
    locks: Option<Arc<dyn LockProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl TaskAppBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a task binding.
    #[must_use]
    pub fn task(mut self, binding: TaskBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Sets the queue client.
    #[must_use]
    pub fn queue(mut self, queue: Arc<dyn QueueClient>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Sets the routine store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn RoutineStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the lock provider.
    #[must_use]
    pub fn locks(mut self, locks: Arc<dyn LockProvider>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validates the configuration, registers every binding and wires the
    /// collaborators together.
    pub fn build(self) -> Result<TaskApp, PushtaskError> {
        self.config.validate()?;
        for binding in &self.bindings {
            if let Some(queue_name) = binding.options().queue_name.as_deref() {
                self.config.validate_queue(queue_name)?;
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryRoutineStore::with_clock(clock.clone())));
        let locks = self
            .locks
            .unwrap_or_else(|| Arc::new(InMemoryLockProvider::new()));
        let queue = self.queue.unwrap_or_else(|| Arc::new(InMemoryQueue::new()));

        let pipelines = PipelineOrchestrator::new(store, locks).with_clock(clock.clone());

        let mut registry = TaskRegistry::new();
        for binding in pipeline_bindings(&pipelines) {
            registry.register(binding)?;
        }
        for binding in self.bindings {
            registry.register(binding)?;
        }
        debug!(
            tasks = registry.len(),
            mode = ?self.config.execution_mode(),
            "Task app built"
        );

        let dispatcher =
            Dispatcher::new(self.config, Arc::new(registry), queue).with_clock(clock);
        Ok(TaskApp {
            dispatcher,
            pipelines,
        })
    }
}

/// A configured task application.
#[derive(Debug)]
pub struct TaskApp {
    dispatcher: Dispatcher,
    pipelines: PipelineOrchestrator,
}

impl TaskApp {
    /// Starts building an application.
    #[must_use]
    pub fn builder() -> TaskAppBuilder {
        TaskAppBuilder::new()
    }

    /// The dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The task registry.
    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        self.dispatcher.registry()
    }

    /// The pipeline orchestrator.
    #[must_use]
    pub fn pipelines(&self) -> &PipelineOrchestrator {
        &self.pipelines
    }

    /// See [`Dispatcher::delay`].
    pub async fn delay(&self, task: &str, kwargs: Kwargs) -> Result<Dispatched, PushtaskError> {
        self.dispatcher.delay(task, kwargs).await
    }

    /// See [`Dispatcher::later`].
    pub async fn later(
        &self,
        task: &str,
        when: impl IntoSchedule,
        kwargs: Kwargs,
    ) -> Result<Dispatched, PushtaskError> {
        self.dispatcher.later(task, when, kwargs).await
    }

    /// See [`Dispatcher::handle_push`].
    pub async fn handle_push(&self, task: &str, body: &[u8]) -> Result<Value, PushtaskError> {
        self.dispatcher.handle_push(task, body).await
    }

    /// Creates a pipeline; see [`PipelineOrchestrator::create`].
    pub async fn create_pipeline(
        &self,
        spec: &PipelineSpec,
    ) -> Result<(Pipeline, Vec<Routine>), PushtaskError> {
        self.pipelines.create(self.registry(), spec).await
    }

    /// Starts a pipeline; see [`PipelineOrchestrator::start`].
    pub async fn start_pipeline(
        &self,
        pipeline_id: PipelineId,
    ) -> Result<Option<RoutineId>, PushtaskError> {
        self.pipelines.start(&self.dispatcher, pipeline_id).await
    }

    /// Reverts a pipeline; see [`PipelineOrchestrator::revert`].
    pub async fn revert_pipeline(
        &self,
        pipeline_id: PipelineId,
    ) -> Result<Vec<RoutineId>, PushtaskError> {
        self.pipelines.revert(&self.dispatcher, pipeline_id).await
    }

    /// Derived status of a pipeline.
    pub async fn pipeline_status(
        &self,
        pipeline_id: PipelineId,
    ) -> Result<PipelineStatus, PushtaskError> {
        self.pipelines.status(pipeline_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ConfigError, RegistryError};
    use crate::pipeline::{ROUTINE_REVERT_TASK, ROUTINE_TASK};
    use crate::tasks::TaskCategory;
    use crate::testing::{kwargs, CalculatePriceTask, SayHelloTask};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_builtin_tasks_are_registered() {
        let app = TaskApp::builder()
            .task(TaskBinding::on_demand("CalculatePriceTask", CalculatePriceTask))
            .build()
            .unwrap();

        assert_eq!(
            app.registry().names(TaskCategory::OnDemand),
            vec!["CalculatePriceTask", ROUTINE_REVERT_TASK, ROUTINE_TASK]
        );
    }

    #[test]
    fn test_builtin_names_are_reserved() {
        let err = TaskApp::builder()
            .task(TaskBinding::on_demand(ROUTINE_TASK, CalculatePriceTask))
            .build()
            .unwrap_err();
        assert!(matches!(err, PushtaskError::Registry(RegistryError::Duplicate { .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = TaskApp::builder()
            .config(TaskConfig::new().with_default_queue("not a queue"))
            .build()
            .unwrap_err();
        assert!(matches!(err, PushtaskError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_invalid_task_queue_is_rejected() {
        let err = TaskApp::builder()
            .task(TaskBinding::on_demand("CalculatePriceTask", CalculatePriceTask).with_queue("pricing queue"))
            .build()
            .unwrap_err();
        assert!(matches!(err, PushtaskError::Config(ConfigError::Invalid { .. })));

        let app = TaskApp::builder()
            .task(TaskBinding::on_demand("CalculatePriceTask", CalculatePriceTask).with_queue("pricing"))
            .build();
        assert!(app.is_ok());
    }

    #[tokio::test]
    async fn test_eager_pipeline_runs_to_completion() {
        let hello = SayHelloTask::new();
        let app = TaskApp::builder()
            .config(TaskConfig::new().with_eager_tasks(true))
            .task(TaskBinding::reversible("SayHelloTask", hello.clone()))
            .task(TaskBinding::on_demand("CalculatePriceTask", CalculatePriceTask))
            .build()
            .unwrap();

        let spec = PipelineSpec::new()
            .routine("SayHelloTask", kwargs(json!({"name": "Harry"})))
            .routine("CalculatePriceTask", kwargs(json!({"price": 10, "quantity": 3})));
        let (pipeline, routines) = app.create_pipeline(&spec).await.unwrap();

        assert_eq!(app.start_pipeline(pipeline.id).await.unwrap(), Some(routines[0].id));
        assert_eq!(app.pipeline_status(pipeline.id).await.unwrap(), PipelineStatus::Completed);

        let last = app.pipelines().store().get_routine(routines[1].id).await.unwrap();
        assert_eq!(last.output, Some(json!(30.0)));
        assert_eq!(hello.runs().len(), 1);
    }
}
