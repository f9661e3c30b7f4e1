//! In-memory push queue.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{PushAck, PushRequest, QueueClient};
use crate::errors::QueueError;

#[derive(Debug, Default)]
struct QueueState {
    /// Whether push attempts are kept in `calls`.
    recording: bool,
    /// Every push attempt, in call order, failed ones included.
    calls: Vec<PushRequest>,
    /// Accepted pushes awaiting delivery.
    pending: VecDeque<(String, PushRequest)>,
    /// Queues currently inside their post-deletion cool-down.
    deleted: HashSet<String>,
    /// Failures to return from the next pushes, oldest first.
    scripted: VecDeque<QueueError>,
}

/// A push queue kept in process memory.
///
/// Deduplicates unique pushes against the pending set by
/// [`PushRequest::fingerprint`] and lets tests drain the pending
/// invocations to simulate delivery. A queue built with
/// [`InMemoryQueue::recording`] also keeps every push attempt.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    next_id: AtomicU64,
}

impl InMemoryQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty queue that records every push attempt.
    #[must_use]
    pub fn recording() -> Self {
        let queue = Self::default();
        queue.state.lock().recording = true;
        queue
    }

    /// Makes pushes to `queue_name` fail as recently deleted.
    pub fn mark_deleted(&self, queue_name: impl Into<String>) {
        self.state.lock().deleted.insert(queue_name.into());
    }

    /// Ends the cool-down of `queue_name`.
    pub fn restore(&self, queue_name: &str) {
        self.state.lock().deleted.remove(queue_name);
    }

    /// Fails the next push with `error`.
    pub fn fail_next(&self, error: QueueError) {
        self.state.lock().scripted.push_back(error);
    }

    /// Every push attempt so far. Empty unless recording.
    #[must_use]
    pub fn calls(&self) -> Vec<PushRequest> {
        self.state.lock().calls.clone()
    }

    /// Number of recorded push attempts.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Pending invocations, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<PushRequest> {
        self.state.lock().pending.iter().map(|(_, r)| r.clone()).collect()
    }

    /// Number of pending invocations.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Removes and returns the oldest pending invocation.
    pub fn pop(&self) -> Option<PushRequest> {
        self.state.lock().pending.pop_front().map(|(_, r)| r)
    }

    /// Removes and returns every pending invocation.
    pub fn drain(&self) -> Vec<PushRequest> {
        self.state.lock().pending.drain(..).map(|(_, r)| r).collect()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn push(&self, request: PushRequest) -> Result<PushAck, QueueError> {
        let mut state = self.state.lock();
        if state.recording {
            state.calls.push(request.clone());
        }

        if let Some(error) = state.scripted.pop_front() {
            return Err(error);
        }
        if state.deleted.contains(&request.queue_name) {
            return Err(QueueError::deleted_recently(&request.queue_name));
        }

        let fingerprint = request.fingerprint();
        if request.is_unique() {
            if let Some((id, _)) = state.pending.iter().find(|(_, r)| r.fingerprint() == fingerprint) {
                return Ok(PushAck::new(request.queue_name, id.clone()));
            }
        }

        let id = format!(
            "{}-{}",
            &fingerprint[..12],
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        );
        let ack = PushAck::new(request.queue_name.clone(), id.clone());
        state.pending.push_back((id, request));
        Ok(ack)
    }
}
