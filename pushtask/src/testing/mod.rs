//! Testing utilities.
//!
//! This module provides:
//! - A tracing layer capturing emitted events
//! - The recording in-memory queue
//! - Sample tasks

mod logs;
mod tasks;

pub use logs::{CapturedLog, LogCapture};
pub use tasks::{kwargs, CalculatePriceTask, FailMiserablyTask, SayHelloTask};

pub use crate::lock::InMemoryLockProvider;
pub use crate::queue::InMemoryQueue;
pub use crate::store::InMemoryRoutineStore;
