//! Queue client contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::QueueError;

/// An enqueue request sent to the push queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Target queue.
    pub queue_name: String,
    /// Endpoint the queue will POST the payload to.
    pub url: String,
    /// JSON-encoded keyword arguments.
    pub payload: String,
    /// Seconds to wait before delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_in_seconds: Option<u64>,
    /// `Some(false)` lets the queue hold duplicate pending invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    /// Task name, sent along with non-unique pushes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
}

impl PushRequest {
    /// Creates an immediate push request.
    #[must_use]
    pub fn new(
        queue_name: impl Into<String>,
        url: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            url: url.into(),
            payload: payload.into(),
            delay_in_seconds: None,
            unique: None,
            task_name: None,
        }
    }

    /// Delays delivery.
    #[must_use]
    pub fn with_delay(mut self, seconds: u64) -> Self {
        self.delay_in_seconds = Some(seconds);
        self
    }

    /// Marks the push as not unique.
    #[must_use]
    pub fn not_unique(mut self, task_name: impl Into<String>) -> Self {
        self.unique = Some(false);
        self.task_name = Some(task_name.into());
        self
    }

    /// The same request aimed at another queue.
    #[must_use]
    pub fn to_queue(&self, queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ..self.clone()
        }
    }

    /// Whether the queue should deduplicate this push.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique.unwrap_or(true)
    }

    /// The task name, taken from the last path segment of the URL.
    #[must_use]
    pub fn target_task(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }

    /// Deduplication key: hex SHA-256 over queue, URL and payload.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.queue_name.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.payload.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Acknowledgement returned by the queue for an accepted push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    /// Queue that accepted the push.
    pub queue_name: String,
    /// Queue-assigned identifier of the pending invocation.
    pub task_id: String,
}

impl PushAck {
    /// Creates a new acknowledgement.
    #[must_use]
    pub fn new(queue_name: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            task_id: task_id.into(),
        }
    }
}

/// Client of the external push queue.
///
/// Implementations report the deleted-within-retention-window condition as
/// [`QueueError::DeletedRecently`], distinct from every other failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Enqueues one invocation.
    async fn push(&self, request: PushRequest) -> Result<PushAck, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PushRequest {
        PushRequest::new(
            "tasks",
            "http://localhost:8080/tasks/CalculatePriceTask",
            r#"{"price":30}"#,
        )
    }

    #[test]
    fn test_defaults_to_unique() {
        let req = request();
        assert!(req.is_unique());
        assert_eq!(req.unique, None);
        assert_eq!(req.delay_in_seconds, None);
    }

    #[test]
    fn test_not_unique_carries_task_name() {
        let req = request().not_unique("CalculatePriceTask");
        assert!(!req.is_unique());
        assert_eq!(req.task_name.as_deref(), Some("CalculatePriceTask"));
    }

    #[test]
    fn test_to_queue_keeps_everything_else() {
        let req = request().with_delay(30);
        let moved = req.to_queue("tasks--temp");
        assert_eq!(moved.queue_name, "tasks--temp");
        assert_eq!(moved.url, req.url);
        assert_eq!(moved.payload, req.payload);
        assert_eq!(moved.delay_in_seconds, Some(30));
    }

    #[test]
    fn test_target_task() {
        assert_eq!(request().target_task(), "CalculatePriceTask");
    }

    #[test]
    fn test_fingerprint_depends_on_payload() {
        let a = request();
        let mut b = request();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.payload = r#"{"price":31}"#.to_string();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let json = serde_json::to_value(request()).unwrap();
        assert!(json.get("delay_in_seconds").is_none());
        assert!(json.get("unique").is_none());
    }
}
