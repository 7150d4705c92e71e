use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info, warn};
use tutor_stream::{EventHandler, EventMeta, Payload, StreamError};

/// Logs every admin event and raises a notice for the configured one.
pub struct BridgeHandler {
    notice_event: String,
    notice_message: String,
    notices: AtomicUsize,
}

impl BridgeHandler {
    pub fn new(notice_event: impl Into<String>, notice_message: impl Into<String>) -> Self {
        Self { notice_event: notice_event.into(), notice_message: notice_message.into(), notices: AtomicUsize::new(0) }
    }

    /// The notice text to show for `event_name`, if any.
    pub fn notice_for(&self, event_name: &str) -> Option<&str> {
        (event_name == self.notice_event).then_some(self.notice_message.as_str())
    }

    pub fn notices(&self) -> usize {
        self.notices.load(Ordering::Relaxed)
    }
}

impl EventHandler for BridgeHandler {
    fn on_open(&self) {
        info!("Admin feed connected");
    }

    fn on_message(&self, payload: Payload, event_name: &str, meta: EventMeta) {
        match &payload {
            Payload::Json(value) => info!(event = %event_name, id = ?meta.id, data = %value, "Admin event"),
            Payload::Text(text) => info!(event = %event_name, id = ?meta.id, data = %text, "Admin event"),
        }

        if let Some(message) = self.notice_for(event_name) {
            self.notices.fetch_add(1, Ordering::Relaxed);
            warn!(target: "admin_feed::notice", "{}", message);
        }
    }

    fn on_error(&self, error: &StreamError) {
        error!("Admin feed error: {}", error);
    }
}
