//! Fallback routing for recently deleted queues.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::{PushAck, PushRequest, QueueClient};
use crate::errors::QueueError;

/// Queue client decorator that survives queue recreation.
///
/// A queue that was deleted cannot be recreated under the same name until
/// a cool-down elapses. When a push fails with
/// [`QueueError::DeletedRecently`], the identical request is pushed once to
/// `<queue_name><temp_suffix>`; whatever that second push returns is final.
/// Every other failure propagates unchanged.
pub struct ResilientQueue {
    inner: Arc<dyn QueueClient>,
    temp_suffix: String,
}

impl ResilientQueue {
    /// Wraps `inner`, falling back to queues named `<queue><temp_suffix>`.
    #[must_use]
    pub fn new(inner: Arc<dyn QueueClient>, temp_suffix: impl Into<String>) -> Self {
        Self {
            inner,
            temp_suffix: temp_suffix.into(),
        }
    }

    /// The fallback queue name for `queue_name`.
    #[must_use]
    pub fn fallback_queue(&self, queue_name: &str) -> String {
        format!("{queue_name}{}", self.temp_suffix)
    }
}

#[async_trait]
impl QueueClient for ResilientQueue {
    async fn push(&self, request: PushRequest) -> Result<PushAck, QueueError> {
        match self.inner.push(request.clone()).await {
            Err(err) if err.is_deleted_recently() => {
                let fallback = self.fallback_queue(&request.queue_name);
                warn!(
                    queue = %request.queue_name,
                    fallback = %fallback,
                    "Queue was deleted recently, pushing to fallback queue"
                );
                self.inner.push(request.to_queue(fallback)).await
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for ResilientQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientQueue")
            .field("temp_suffix", &self.temp_suffix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MockQueueClient;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    fn request() -> PushRequest {
        PushRequest::new(
            "tasks",
            "http://localhost:8080/tasks/CalculatePriceTask",
            r#"{"discount":0.2,"price":30,"quantity":4}"#,
        )
    }

    fn resilient(mock: MockQueueClient) -> ResilientQueue {
        ResilientQueue::new(Arc::new(mock), "--temp")
    }

    #[tokio::test]
    async fn test_passes_through_success() {
        let mut mock = MockQueueClient::new();
        mock.expect_push()
            .with(eq(request()))
            .times(1)
            .returning(|req| Ok(PushAck::new(req.queue_name, "1")));

        let ack = resilient(mock).push(request()).await.unwrap();
        assert_eq!(ack, PushAck::new("tasks", "1"));
    }

    #[tokio::test]
    async fn test_reroutes_deleted_queue_once() {
        let mut seq = Sequence::new();
        let mut mock = MockQueueClient::new();
        mock.expect_push()
            .with(eq(request()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(QueueError::deleted_recently("tasks")));
        mock.expect_push()
            .with(eq(request().to_queue("tasks--temp")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| Ok(PushAck::new(req.queue_name, "2")));

        let ack = resilient(mock).push(request()).await.unwrap();
        assert_eq!(ack.queue_name, "tasks--temp");
    }

    #[tokio::test]
    async fn test_fallback_failure_propagates() {
        let mut seq = Sequence::new();
        let mut mock = MockQueueClient::new();
        mock.expect_push()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(QueueError::deleted_recently("tasks")));
        mock.expect_push()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(QueueError::deleted_recently("tasks--temp")));

        let err = resilient(mock).push(request()).await.unwrap_err();
        assert_eq!(err, QueueError::deleted_recently("tasks--temp"));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let mut mock = MockQueueClient::new();
        mock.expect_push()
            .times(1)
            .returning(|_| Err(QueueError::push("tasks", "permission denied")));

        let err = resilient(mock).push(request()).await.unwrap_err();
        assert_eq!(err, QueueError::push("tasks", "permission denied"));
    }

    #[test]
    fn test_fallback_queue_name() {
        let queue = resilient(MockQueueClient::new());
        assert_eq!(queue.fallback_queue("dedicated"), "dedicated--temp");
    }
}
