use crate::error::StreamError;
use crate::stream::ParsedEvent;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Event data as delivered to handlers: decoded JSON when the data parses, the raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn from_data(data: String) -> Self {
        match serde_json::from_str::<Value>(&data) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub id: Option<String>,
    pub raw: String,
}

/// Callbacks of an event-stream client. All of them run on the session task, in order,
/// so a slow handler pauses parsing.
pub trait EventHandler: Send + Sync + 'static {
    fn on_open(&self) {}

    fn on_message(&self, _payload: Payload, _event_name: &str, _meta: EventMeta) {}

    fn on_error(&self, _error: &StreamError) {}
}

impl<H: EventHandler> EventHandler for Arc<H> {
    fn on_open(&self) {
        (**self).on_open()
    }

    fn on_message(&self, payload: Payload, event_name: &str, meta: EventMeta) {
        (**self).on_message(payload, event_name, meta)
    }

    fn on_error(&self, error: &StreamError) {
        (**self).on_error(error)
    }
}

/// Hands a parsed event to the handler. Blocks without data are dropped.
///
/// Returns `true` when `on_message` was invoked.
pub fn dispatch(handler: &dyn EventHandler, event: ParsedEvent) -> bool {
    let ParsedEvent { event_name, id, data, raw } = event;

    let Some(data) = data else {
        debug!(raw = %raw, "SSE block without data");
        return false;
    };

    let payload = Payload::from_data(data);
    debug!(event = %event_name, id = ?id, "SSE event");
    handler.on_message(payload, &event_name, EventMeta { id, raw });
    true
}

/// Callback record forwarded by [`ChannelHandler`].
#[derive(Debug)]
pub enum StreamNotice {
    Open,
    Message { payload: Payload, event_name: String, meta: EventMeta },
    Error(String),
}

/// Forwards every callback into an unbounded channel, for consumers that prefer to
/// `recv().await` instead of implementing [`EventHandler`].
#[derive(Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<StreamNotice>,
}

impl ChannelHandler {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventHandler for ChannelHandler {
    fn on_open(&self) {
        let _ = self.tx.send(StreamNotice::Open);
    }

    fn on_message(&self, payload: Payload, event_name: &str, meta: EventMeta) {
        let _ = self.tx.send(StreamNotice::Message { payload, event_name: event_name.to_string(), meta });
    }

    fn on_error(&self, error: &StreamError) {
        let _ = self.tx.send(StreamNotice::Error(error.to_string()));
    }
}
