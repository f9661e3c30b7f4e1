//! Task capabilities and bindings.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::TaskOptions;
use crate::dispatch::Dispatcher;
use crate::errors::{PushtaskError, TaskError};

/// Keyword arguments of a task invocation.
pub type Kwargs = serde_json::Map<String, Value>;

/// Context handed to a task while it runs.
///
/// Gives tasks access to the dispatcher that invoked them, so a task can
/// enqueue follow-up work without reaching for global state.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    dispatcher: &'a Dispatcher,
    task_name: &'a str,
}

impl<'a> TaskContext<'a> {
    /// Creates a context for `task_name`.
    #[must_use]
    pub fn new(dispatcher: &'a Dispatcher, task_name: &'a str) -> Self {
        Self {
            dispatcher,
            task_name,
        }
    }

    /// The dispatcher running this task.
    #[must_use]
    pub fn dispatcher(&self) -> &'a Dispatcher {
        self.dispatcher
    }

    /// The name the task was invoked under.
    #[must_use]
    pub fn task_name(&self) -> &'a str {
        self.task_name
    }
}

/// A named, stateless unit of work.
#[async_trait]
pub trait Task: Send + Sync {
    /// Runs the task with the given keyword arguments.
    async fn run(&self, ctx: &TaskContext<'_>, kwargs: Kwargs) -> Result<Value, TaskError>;
}

/// Compensating action for a task whose output must be undone.
#[async_trait]
pub trait Revert: Send + Sync {
    /// Undoes a previous run, given the output that run produced.
    async fn revert(&self, ctx: &TaskContext<'_>, data: Value) -> Result<(), TaskError>;
}

/// Deserializes keyword arguments into a typed argument struct.
pub fn parse_kwargs<T: DeserializeOwned>(kwargs: Kwargs) -> Result<T, TaskError> {
    serde_json::from_value(Value::Object(kwargs))
        .map_err(|e| TaskError::invalid_arguments(e.to_string()))
}

type TaskFn = Box<dyn Fn(Kwargs) -> BoxFuture<'static, Result<Value, TaskError>> + Send + Sync>;

/// A task backed by an async closure.
pub struct FnTask {
    func: TaskFn,
}

impl FnTask {
    /// Creates a new closure-based task.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        Self {
            func: Box::new(move |kwargs| func(kwargs).boxed()),
        }
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for FnTask {
    async fn run(&self, _ctx: &TaskContext<'_>, kwargs: Kwargs) -> Result<Value, TaskError> {
        (self.func)(kwargs).await
    }
}

/// Registry partition a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// Invoked explicitly through the dispatcher.
    OnDemand,
    /// Invoked on a schedule by the queue's scheduler.
    Periodic,
    /// Invoked when an event is delivered to a subscription.
    Subscriber,
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnDemand => write!(f, "on_demand"),
            Self::Periodic => write!(f, "periodic"),
            Self::Subscriber => write!(f, "subscriber"),
        }
    }
}

/// A task registered under a name.
#[derive(Clone)]
pub struct TaskBinding {
    name: String,
    category: TaskCategory,
    trigger: Option<String>,
    options: TaskOptions,
    runner: Arc<dyn Task>,
    reverter: Option<Arc<dyn Revert>>,
}

impl TaskBinding {
    fn with_category(name: impl Into<String>, category: TaskCategory, runner: Arc<dyn Task>) -> Self {
        Self {
            name: name.into(),
            category,
            trigger: None,
            options: TaskOptions::default(),
            runner,
            reverter: None,
        }
    }

    /// Binds an on-demand task.
    pub fn on_demand(name: impl Into<String>, task: impl Task + 'static) -> Self {
        Self::with_category(name, TaskCategory::OnDemand, Arc::new(task))
    }

    /// Binds an on-demand task that can also revert its own runs.
    pub fn reversible<T>(name: impl Into<String>, task: T) -> Self
    where
        T: Task + Revert + 'static,
    {
        let task = Arc::new(task);
        let runner: Arc<dyn Task> = task.clone();
        let reverter: Arc<dyn Revert> = task;
        let mut binding = Self::with_category(name, TaskCategory::OnDemand, runner);
        binding.reverter = Some(reverter);
        binding
    }

    /// Binds a periodic task with its cron-style schedule.
    pub fn periodic(
        name: impl Into<String>,
        schedule: impl Into<String>,
        task: impl Task + 'static,
    ) -> Self {
        let mut binding = Self::with_category(name, TaskCategory::Periodic, Arc::new(task));
        binding.trigger = Some(schedule.into());
        binding
    }

    /// Binds a subscriber task with the topic it listens to.
    pub fn subscriber(
        name: impl Into<String>,
        topic: impl Into<String>,
        task: impl Task + 'static,
    ) -> Self {
        let mut binding = Self::with_category(name, TaskCategory::Subscriber, Arc::new(task));
        binding.trigger = Some(topic.into());
        binding
    }

    /// Attaches a separate revert implementation.
    #[must_use]
    pub fn with_revert(mut self, reverter: impl Revert + 'static) -> Self {
        self.reverter = Some(Arc::new(reverter));
        self
    }

    /// Replaces the dispatch options.
    #[must_use]
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    /// Routes the task to a dedicated queue.
    #[must_use]
    pub fn with_queue(mut self, queue_name: impl Into<String>) -> Self {
        self.options = self.options.with_queue(queue_name);
        self
    }

    /// Allows duplicate pending invocations of this task.
    #[must_use]
    pub fn not_unique(mut self) -> Self {
        self.options = self.options.not_unique();
        self
    }

    /// The registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registry partition.
    #[must_use]
    pub fn category(&self) -> TaskCategory {
        self.category
    }

    /// Cron schedule (periodic) or topic (subscriber).
    #[must_use]
    pub fn trigger(&self) -> Option<&str> {
        self.trigger.as_deref()
    }

    /// Dispatch options.
    #[must_use]
    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    /// Whether the binding can revert.
    #[must_use]
    pub fn is_revertible(&self) -> bool {
        self.reverter.is_some()
    }

    /// Runs the bound task.
    pub async fn run(&self, ctx: &TaskContext<'_>, kwargs: Kwargs) -> Result<Value, TaskError> {
        self.runner.run(ctx, kwargs).await
    }

    /// Reverts a previous run of the bound task.
    ///
    /// Fails with [`PushtaskError::NotRevertible`] when the binding has no
    /// revert capability.
    pub async fn revert(&self, ctx: &TaskContext<'_>, data: Value) -> Result<(), PushtaskError> {
        let reverter = self.reverter.as_ref().ok_or_else(|| PushtaskError::NotRevertible {
            task: self.name.clone(),
        })?;
        reverter
            .revert(ctx, data)
            .await
            .map_err(|source| PushtaskError::TaskFailed {
                task: self.name.clone(),
                source,
            })
    }
}

impl fmt::Debug for TaskBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBinding")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("trigger", &self.trigger)
            .field("options", &self.options)
            .field("revertible", &self.is_revertible())
            .finish()
    }
}
