//! Named exclusive locks.
//!
//! Every transition of a pipeline routine happens while holding the lock
//! returned by [`routine_lock_key`].

mod memory;
mod provider;

pub use memory::{InMemoryLockProvider, LockRequest};
pub use provider::{
    routine_lock_key, LockGuard, LockProvider, ROUTINE_LOCK_BLOCKING_TIMEOUT, ROUTINE_LOCK_TIMEOUT,
};
