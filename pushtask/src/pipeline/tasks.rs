//! Built-in tasks driving pipeline routines through the queue.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::engine::RoutineEngine;
use super::model::RoutineId;
use super::orchestrator::PipelineOrchestrator;
use super::revert::RevertEngine;
use crate::errors::TaskError;
use crate::tasks::{parse_kwargs, Kwargs, Task, TaskBinding, TaskContext};

/// Name of the task executing a routine.
pub const ROUTINE_TASK: &str = "PipelineRoutineTask";

/// Name of the task reverting a routine.
pub const ROUTINE_REVERT_TASK: &str = "PipelineRoutineRevertTask";

#[derive(Debug, Deserialize)]
struct RoutineArgs {
    routine_id: i64,
}

/// Keyword arguments addressing `routine_id`.
#[must_use]
pub fn routine_kwargs(routine_id: RoutineId) -> Kwargs {
    let mut kwargs = Kwargs::new();
    kwargs.insert("routine_id".to_string(), json!(routine_id.0));
    kwargs
}

/// Executes the routine named by `routine_id`.
#[derive(Debug, Clone)]
pub struct PipelineRoutineTask {
    engine: RoutineEngine,
}

impl PipelineRoutineTask {
    /// Creates the task over `pipelines`.
    #[must_use]
    pub fn new(pipelines: PipelineOrchestrator) -> Self {
        Self {
            engine: RoutineEngine::new(pipelines),
        }
    }
}

#[async_trait]
impl Task for PipelineRoutineTask {
    async fn run(&self, ctx: &TaskContext<'_>, kwargs: Kwargs) -> Result<Value, TaskError> {
        let args: RoutineArgs = parse_kwargs(kwargs)?;
        let outcome = self
            .engine
            .execute(ctx.dispatcher(), RoutineId(args.routine_id))
            .await?;
        Ok(json!({"routine_id": args.routine_id, "outcome": outcome}))
    }
}

/// Reverts the routine named by `routine_id`.
#[derive(Debug, Clone)]
pub struct PipelineRoutineRevertTask {
    engine: RevertEngine,
}

impl PipelineRoutineRevertTask {
    /// Creates the task over `pipelines`.
    #[must_use]
    pub fn new(pipelines: PipelineOrchestrator) -> Self {
        Self {
            engine: RevertEngine::new(pipelines),
        }
    }
}

#[async_trait]
impl Task for PipelineRoutineRevertTask {
    async fn run(&self, ctx: &TaskContext<'_>, kwargs: Kwargs) -> Result<Value, TaskError> {
        let args: RoutineArgs = parse_kwargs(kwargs)?;
        let outcome = self
            .engine
            .revert(ctx.dispatcher(), RoutineId(args.routine_id))
            .await?;
        Ok(json!({"routine_id": args.routine_id, "outcome": outcome}))
    }
}

/// The two bindings every application registers.
#[must_use]
pub fn pipeline_bindings(pipelines: &PipelineOrchestrator) -> [TaskBinding; 2] {
    [
        TaskBinding::on_demand(ROUTINE_TASK, PipelineRoutineTask::new(pipelines.clone())),
        TaskBinding::on_demand(
            ROUTINE_REVERT_TASK,
            PipelineRoutineRevertTask::new(pipelines.clone()),
        ),
    ]
}
