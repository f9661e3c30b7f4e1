//! Task bindings and the task registry.
//!
//! This module provides:
//! - The [`Task`] and [`Revert`] capabilities implemented by application code
//! - [`TaskBinding`], a named task with its category and dispatch options
//! - [`TaskRegistry`], the name-to-binding map built once at startup

mod binding;
mod registry;

pub use binding::{parse_kwargs, FnTask, Kwargs, Revert, Task, TaskBinding, TaskCategory, TaskContext};
pub use registry::TaskRegistry;
