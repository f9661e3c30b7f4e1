//! Pipelines of revertible routines.
//!
//! This module provides:
//! - Routine and pipeline records with their derived status
//! - The orchestrator creating, starting and reverting pipelines
//! - The execution and revert engines, each run under a per-routine lock
//! - The built-in tasks the queue invokes to drive routines

mod engine;
mod model;
mod orchestrator;
mod revert;
mod tasks;


pub use engine::{RoutineEngine, RoutineOutcome};
pub use model::{
    Pipeline, PipelineId, PipelineSpec, PipelineStatus, Routine, RoutineId, RoutineSpec,
    RoutineStatus, DEFAULT_MAX_RETRIES,
};
pub use orchestrator::PipelineOrchestrator;
pub use revert::{RevertEngine, RevertOutcome};
pub use tasks::{
    pipeline_bindings, routine_kwargs, PipelineRoutineRevertTask, PipelineRoutineTask,
    ROUTINE_REVERT_TASK, ROUTINE_TASK,
};
