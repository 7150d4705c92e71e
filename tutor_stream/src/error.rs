use reqwest::StatusCode;
use std::time::Duration;

/// Failures of a single connection attempt.
///
/// Every variant is handled the same way by the session: logged, reported once through
/// `EventHandler::on_error` and followed by a backoff-delayed reconnect.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("SSE HTTP {status}")]
    HttpStatus { status: StatusCode },
    #[error("SSE endpoint did not return text/event-stream (content-type: {content_type:?})")]
    ProtocolMismatch { content_type: String, snippet: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("SSE stream closed by server")]
    StreamClosed,
    #[error("Invalid SSE url: {0}")]
    InvalidUrl(String),
}

impl StreamError {
    /// Status code of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StreamError::HttpStatus { status } => Some(*status),
            StreamError::Network(err) => err.status(),
            _ => None,
        }
    }
}

/// Errors raised while setting up the client or its collaborators, outside the retry path.
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("JsonSerde error: {0}")]
    JsonSerde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
