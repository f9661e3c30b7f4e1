//! Lock provider contract.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::errors::LockError;

/// How long a routine lock is held before the provider may expire it.
pub const ROUTINE_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for a routine lock held elsewhere.
pub const ROUTINE_LOCK_BLOCKING_TIMEOUT: Duration = Duration::from_secs(5);

/// Lock key guarding every transition of routine `routine_id`.
#[must_use]
pub fn routine_lock_key(routine_id: impl fmt::Display) -> String {
    format!("lock-PipelineRoutineTask-{routine_id}")
}

/// A distributed lock service.
#[async_trait]
pub trait LockProvider: Send + Sync + fmt::Debug {
    /// Acquires the lock named `key`.
    ///
    /// The lock expires after `timeout` unless released first. If it is
    /// held elsewhere, waits at most `blocking_timeout` before failing with
    /// [`LockError::Timeout`].
    async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
        blocking_timeout: Duration,
    ) -> Result<LockGuard, LockError>;
}

type ReleaseFn = Box<dyn FnOnce() + Send + Sync>;

/// A held lock. Released when dropped.
pub struct LockGuard {
    key: String,
    release: Option<ReleaseFn>,
}

impl LockGuard {
    /// Creates a guard that runs `release` exactly once.
    pub fn new(key: impl Into<String>, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            key: key.into(),
            release: Some(Box::new(release)),
        }
    }

    /// The lock key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the lock now.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("held", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_routine_lock_key() {
        assert_eq!(routine_lock_key(42), "lock-PipelineRoutineTask-42");
    }

    #[test]
    fn test_guard_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let guard = LockGuard::new("k", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        guard.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        {
            let _guard = LockGuard::new("k", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
