//! Task dispatch.
//!
//! This module provides:
//! - [`Dispatcher`], the entry point for immediate, delayed and eager invocations
//! - [`Schedule`] and [`IntoSchedule`] for the `when` argument of `later`
//! - Deterministic payload serialization

mod dispatcher;
mod payload;
mod schedule;

pub use dispatcher::{Dispatched, Dispatcher};
pub use payload::{into_kwargs, parse_body, serialize_payload};
pub use schedule::{IntoSchedule, Schedule};
