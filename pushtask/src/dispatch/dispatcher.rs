//! The task dispatcher.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::payload::{parse_body, serialize_payload};
use super::schedule::IntoSchedule;
use crate::config::{ExecutionMode, TaskConfig};
use crate::errors::PushtaskError;
use crate::queue::{PushAck, PushRequest, QueueClient, ResilientQueue};
use crate::tasks::{Kwargs, TaskBinding, TaskContext, TaskRegistry};
use crate::utils::{Clock, SystemClock};

/// Result of a `delay` or `later` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// The queue accepted the invocation.
    Enqueued(PushAck),
    /// Eager mode ran the task in-process.
    Executed(Value),
}

impl Dispatched {
    /// The queue acknowledgement, if the invocation was enqueued.
    #[must_use]
    pub fn ack(&self) -> Option<&PushAck> {
        match self {
            Self::Enqueued(ack) => Some(ack),
            Self::Executed(_) => None,
        }
    }

    /// The task result, if the invocation ran eagerly.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Enqueued(_) => None,
            Self::Executed(value) => Some(value),
        }
    }
}

/// Turns task invocations into queue pushes, or runs them in eager mode.
///
/// Every push goes through a [`ResilientQueue`], so a queue that was deleted
/// recently is transparently replaced by its temporary twin.
pub struct Dispatcher {
    config: TaskConfig,
    registry: Arc<TaskRegistry>,
    queue: ResilientQueue,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Creates a dispatcher pushing to `queue`.
    #[must_use]
    pub fn new(config: TaskConfig, registry: Arc<TaskRegistry>, queue: Arc<dyn QueueClient>) -> Self {
        let queue = ResilientQueue::new(queue, config.temp_queue_suffix.clone());
        Self {
            config,
            registry,
            queue,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to resolve absolute schedules.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The process configuration.
    #[must_use]
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// The task registry.
    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// The clock.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Enqueues an immediate invocation of `task`.
    pub async fn delay(&self, task: &str, kwargs: Kwargs) -> Result<Dispatched, PushtaskError> {
        self.dispatch(task, kwargs, None).await
    }

    /// Enqueues an invocation of `task` to be delivered at `when`.
    ///
    /// `when` is an absolute timestamp, a duration or a non-negative number
    /// of seconds. Anything else fails with
    /// [`PushtaskError::UnsupportedSchedule`] before anything is enqueued.
    pub async fn later(
        &self,
        task: &str,
        when: impl IntoSchedule,
        kwargs: Kwargs,
    ) -> Result<Dispatched, PushtaskError> {
        let schedule = when.into_schedule()?;
        let delay = schedule.delay_in_seconds(self.clock.now());
        self.dispatch(task, kwargs, Some(delay)).await
    }

    /// Builds the push request for an invocation without sending it.
    pub fn build_request(
        &self,
        task: &str,
        kwargs: &Kwargs,
        delay_in_seconds: Option<u64>,
    ) -> Result<PushRequest, PushtaskError> {
        let binding = self.registry.get(task)?;
        self.request_for(binding, kwargs, delay_in_seconds)
    }

    fn request_for(
        &self,
        binding: &TaskBinding,
        kwargs: &Kwargs,
        delay_in_seconds: Option<u64>,
    ) -> Result<PushRequest, PushtaskError> {
        let options = binding.options();
        let mut request = PushRequest::new(
            options.queue_name(&self.config),
            self.config.task_url(binding.name()),
            serialize_payload(kwargs)?,
        );
        if let Some(seconds) = delay_in_seconds {
            request = request.with_delay(seconds);
        }
        if !options.unique {
            request = request.not_unique(binding.name());
        }
        Ok(request)
    }

    async fn dispatch(
        &self,
        task: &str,
        kwargs: Kwargs,
        delay_in_seconds: Option<u64>,
    ) -> Result<Dispatched, PushtaskError> {
        let binding = self.registry.get(task)?;

        if self.config.execution_mode() == ExecutionMode::Eager {
            debug!(task = %task, "Running task eagerly");
            return self.run_binding(binding, kwargs).await.map(Dispatched::Executed);
        }

        let request = self.request_for(binding, &kwargs, delay_in_seconds)?;
        debug!(
            task = %task,
            queue = %request.queue_name,
            delay_in_seconds = ?request.delay_in_seconds,
            unique = request.is_unique(),
            "Pushing task"
        );
        let ack = self.queue.push(request).await?;
        Ok(Dispatched::Enqueued(ack))
    }

    /// Runs `task` in-process and returns its result.
    pub async fn invoke(&self, task: &str, kwargs: Kwargs) -> Result<Value, PushtaskError> {
        let binding = self.registry.get(task)?;
        self.run_binding(binding, kwargs).await
    }

    async fn run_binding(&self, binding: &TaskBinding, kwargs: Kwargs) -> Result<Value, PushtaskError> {
        let ctx = TaskContext::new(self, binding.name());
        binding
            .run(&ctx, kwargs)
            .await
            .map_err(|source| PushtaskError::TaskFailed {
                task: binding.name().to_string(),
                source,
            })
    }

    /// Handles a pushed invocation of `task` carrying a JSON `body`.
    ///
    /// The body must be a JSON object; an empty body means no arguments.
    pub async fn handle_push(&self, task: &str, body: &[u8]) -> Result<Value, PushtaskError> {
        let kwargs = parse_body(body)?;
        self.invoke(task, kwargs).await
    }

    /// Delivers a push request in-process, as the queue would.
    pub async fn handle_request(&self, request: &PushRequest) -> Result<Value, PushtaskError> {
        self.handle_push(request.target_task(), request.payload.as_bytes())
            .await
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("queue", &self.queue)
            .field("clock", &self.clock)
            .finish()
    }
}
