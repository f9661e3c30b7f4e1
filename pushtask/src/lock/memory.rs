//! In-process lock provider.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::{LockGuard, LockProvider};
use crate::errors::LockError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One call to [`LockProvider::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    /// The requested key.
    pub key: String,
    /// Requested expiry.
    pub timeout: Duration,
    /// Requested blocking wait.
    pub blocking_timeout: Duration,
}

#[derive(Debug, Default)]
struct LockTable {
    held: HashMap<String, (Uuid, Instant)>,
    recording: bool,
    requests: Vec<LockRequest>,
    releases: Vec<String>,
}

/// A lock provider for a single process.
///
/// Expired locks are treated as free. A provider built with
/// [`InMemoryLockProvider::recording`] also keeps every acquire and release
/// so callers can assert on lock usage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockProvider {
    table: Arc<Mutex<LockTable>>,
}

impl InMemoryLockProvider {
    /// Creates a provider with no locks held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that records every acquire and release.
    #[must_use]
    pub fn recording() -> Self {
        let provider = Self::default();
        provider.table.lock().recording = true;
        provider
    }

    /// Every acquire call so far. Empty unless recording.
    #[must_use]
    pub fn requests(&self) -> Vec<LockRequest> {
        self.table.lock().requests.clone()
    }

    /// Keys released so far, in release order. Empty unless recording.
    #[must_use]
    pub fn releases(&self) -> Vec<String> {
        self.table.lock().releases.clone()
    }

    /// Whether `key` is currently held.
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.table
            .lock()
            .held
            .get(key)
            .is_some_and(|(_, expires)| *expires > Instant::now())
    }

    fn try_acquire(&self, key: &str, timeout: Duration) -> Option<LockGuard> {
        let mut table = self.table.lock();
        let now = Instant::now();
        if table.held.get(key).is_some_and(|(_, expires)| *expires > now) {
            return None;
        }

        let token = Uuid::new_v4();
        table.held.insert(key.to_string(), (token, now + timeout));

        let shared = Arc::clone(&self.table);
        let owned_key = key.to_string();
        Some(LockGuard::new(key, move || {
            let mut table = shared.lock();
            // An expired lock may have been taken over by someone else.
            if table.held.get(&owned_key).is_some_and(|(t, _)| *t == token) {
                table.held.remove(&owned_key);
            }
            if table.recording {
                table.releases.push(owned_key);
            }
        }))
    }
}

#[async_trait]
impl LockProvider for InMemoryLockProvider {
    async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
        blocking_timeout: Duration,
    ) -> Result<LockGuard, LockError> {
        {
            let mut table = self.table.lock();
            if table.recording {
                table.requests.push(LockRequest {
                    key: key.to_string(),
                    timeout,
                    blocking_timeout,
                });
            }
        }

        let started = Instant::now();
        let deadline = started + blocking_timeout;
        loop {
            if let Some(guard) = self.try_acquire(key, timeout) {
                return Ok(guard);
            }
            if Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    key: key.to_string(),
                    waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
