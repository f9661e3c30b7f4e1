//! Push queue contract and helpers.
//!
//! This module provides:
//! - [`QueueClient`], the contract of the external push queue
//! - [`PushRequest`]/[`PushAck`], its request and acknowledgement types
//! - [`ResilientQueue`], which reroutes pushes while a queue is being recreated
//! - [`InMemoryQueue`], a queue kept in process memory for eager setups and tests

mod client;
mod memory;
mod resilience;

pub use client::{PushAck, PushRequest, QueueClient};
pub use memory::InMemoryQueue;
pub use resilience::ResilientQueue;

#[cfg(test)]
pub use client::MockQueueClient;
