//! # Pushtask
//!
//! Task dispatch to push-based queues, and pipelines of revertible routines.
//!
//! Pushtask provides:
//!
//! - **Dispatch**: enqueue named tasks now or later, or run them eagerly in-process
//! - **Queue resilience**: pushes to a recently deleted queue fall back to a temporary twin
//! - **Pipelines**: ordered routines with per-routine locking and bounded retries
//! - **Revert**: completed routines are compensated in reverse completion order
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pushtask::prelude::*;
//!
//! let app = TaskApp::builder()
//!     .config(TaskConfig::from_env()?)
//!     .queue(queue_client)
//!     .task(TaskBinding::reversible("SendInvoiceTask", SendInvoiceTask))
//!     .build()?;
//!
//! app.delay("SendInvoiceTask", kwargs).await?;
//! app.later("SendInvoiceTask", TimeDelta::minutes(30), kwargs).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod app;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod lock;
pub mod observability;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod tasks;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::app::{TaskApp, TaskAppBuilder};
    pub use crate::config::{ExecutionMode, TaskConfig, TaskOptions};
    pub use crate::dispatch::{Dispatched, Dispatcher, IntoSchedule, Schedule};
    pub use crate::errors::{PushtaskError, TaskError, TaskNotFound, UnsupportedScheduleError};
    pub use crate::lock::{LockGuard, LockProvider};
    pub use crate::pipeline::{
        PipelineId, PipelineOrchestrator, PipelineSpec, PipelineStatus, Routine, RoutineId,
        RoutineStatus,
    };
    pub use crate::queue::{PushAck, PushRequest, QueueClient};
    pub use crate::store::RoutineStore;
    pub use crate::tasks::{
        parse_kwargs, FnTask, Kwargs, Revert, Task, TaskBinding, TaskContext, TaskRegistry,
    };
    pub use crate::utils::{Clock, SystemClock, Timestamp};
}
