//! Sample tasks.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::errors::TaskError;
use crate::tasks::{parse_kwargs, Kwargs, Revert, Task, TaskContext};

/// Turns a JSON object into keyword arguments. Anything else yields none.
#[must_use]
pub fn kwargs(value: Value) -> Kwargs {
    match value {
        Value::Object(map) => map,
        _ => Kwargs::new(),
    }
}

#[derive(Debug, Deserialize)]
struct PriceArgs {
    price: f64,
    quantity: f64,
    #[serde(default)]
    discount: f64,
}

/// Computes `price * quantity * (1 - discount)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatePriceTask;

#[async_trait]
impl Task for CalculatePriceTask {
    async fn run(&self, _ctx: &TaskContext<'_>, kwargs: Kwargs) -> Result<Value, TaskError> {
        let args: PriceArgs = parse_kwargs(kwargs)?;
        Ok(json!(args.price * args.quantity * (1.0 - args.discount)))
    }
}

/// Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailMiserablyTask;

#[async_trait]
impl Task for FailMiserablyTask {
    async fn run(&self, _ctx: &TaskContext<'_>, _kwargs: Kwargs) -> Result<Value, TaskError> {
        Err(TaskError::failed("Failed miserably"))
    }
}

#[derive(Debug, Default)]
struct HelloState {
    runs: Vec<Kwargs>,
    reverts: Vec<Value>,
    failure: Option<String>,
    revert_failure: Option<String>,
}

/// A reversible greeting task recording its calls.
///
/// Clones share state, so a test can keep one handle and register another.
#[derive(Debug, Clone, Default)]
pub struct SayHelloTask {
    state: Arc<Mutex<HelloState>>,
}

impl SayHelloTask {
    /// Creates a task that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent runs fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().failure = Some(message.into());
    }

    /// Makes subsequent reverts fail with `message`.
    pub fn fail_reverts_with(&self, message: impl Into<String>) {
        self.state.lock().revert_failure = Some(message.into());
    }

    /// Lets runs and reverts succeed again.
    pub fn succeed(&self) {
        let mut state = self.state.lock();
        state.failure = None;
        state.revert_failure = None;
    }

    /// Arguments of every run so far.
    #[must_use]
    pub fn runs(&self) -> Vec<Kwargs> {
        self.state.lock().runs.clone()
    }

    /// Data passed to every revert so far.
    #[must_use]
    pub fn reverts(&self) -> Vec<Value> {
        self.state.lock().reverts.clone()
    }
}

#[async_trait]
impl Task for SayHelloTask {
    async fn run(&self, _ctx: &TaskContext<'_>, kwargs: Kwargs) -> Result<Value, TaskError> {
        let mut state = self.state.lock();
        state.runs.push(kwargs.clone());
        if let Some(message) = &state.failure {
            return Err(TaskError::failed(message.clone()));
        }
        let name = kwargs.get("name").and_then(Value::as_str).unwrap_or("world");
        Ok(json!({"message": format!("Hello, {name}!")}))
    }
}

#[async_trait]
impl Revert for SayHelloTask {
    async fn revert(&self, _ctx: &TaskContext<'_>, data: Value) -> Result<(), TaskError> {
        let mut state = self.state.lock();
        state.reverts.push(data);
        match &state.revert_failure {
            Some(message) => Err(TaskError::failed(message.clone())),
            None => Ok(()),
        }
    }
}
