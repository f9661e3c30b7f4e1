//! Log capture for assertions on emitted events.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLog {
    /// Event level.
    pub level: Level,
    /// Event target.
    pub target: String,
    /// The formatted message.
    pub message: String,
}

/// A tracing layer recording every event it sees.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the capture as the current thread's default subscriber.
    ///
    /// Events are recorded until the returned guard is dropped.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    /// Every captured event.
    #[must_use]
    pub fn records(&self) -> Vec<CapturedLog> {
        self.records.lock().clone()
    }

    /// Messages of events at INFO or more severe, in emission order.
    #[must_use]
    pub fn info_messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level <= Level::INFO)
            .map(|r| r.message.clone())
            .collect()
    }

    /// Messages of events at exactly `level`.
    #[must_use]
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.clone())
            .collect()
    }

    /// Forgets everything captured so far.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.records.lock().push(CapturedLog {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing::{debug, info, warn};

    #[test]
    fn test_captures_messages() {
        let capture = LogCapture::new();
        {
            let _guard = capture.install();
            let id = 7;
            info!(routine_id = id, "Routine #{id} is running");
            debug!("not shown at info");
            warn!("careful");
        }
        info!("after the guard is dropped");

        assert_eq!(
            capture.info_messages(),
            vec!["Routine #7 is running".to_string(), "careful".to_string()]
        );
        assert_eq!(capture.messages_at(Level::DEBUG), vec!["not shown at info".to_string()]);
        assert_eq!(capture.records().len(), 3);
    }

    #[test]
    fn test_clear() {
        let capture = LogCapture::new();
        let _guard = capture.install();
        info!("one");
        capture.clear();
        assert!(capture.records().is_empty());
    }
}
