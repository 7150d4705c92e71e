use crate::config::StreamConfig;
use crate::error::StreamError;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const TEXT_EVENT_STREAM: &str = "text/event-stream";
const LAST_EVENT_ID: &str = "Last-Event-ID";
const SNIPPET_READ_LIMIT: Duration = Duration::from_secs(2);

/// Joins `endpoint` onto `base` without doubled slashes. Absolute endpoints pass through.
pub fn resolve_url(base: &str, endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return endpoint.to_string();
    }
    let base = base.trim().trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    if base.is_empty() {
        format!("/{}", endpoint)
    } else {
        format!("{}/{}", base, endpoint)
    }
}

/// One connection attempt's request parameters, gathered fresh per attempt.
#[derive(Debug, Clone)]
pub struct ConnectRequest<'a> {
    pub url: &'a str,
    pub token: Option<&'a str>,
    pub last_event_id: Option<&'a str>,
}

/// Issues the streaming GET and validates status and content type.
///
/// On success the response body has not been touched and is ready for the frame reader.
pub async fn connect(http: &Client, request: ConnectRequest<'_>, config: &StreamConfig) -> Result<Response, StreamError> {
    let url = reqwest::Url::parse(request.url).map_err(|e| StreamError::InvalidUrl(format!("{}: {}", request.url, e)))?;

    let mut builder = http.get(url).header(ACCEPT, TEXT_EVENT_STREAM).header(CACHE_CONTROL, "no-cache");
    if let Some(token) = request.token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    if config.resume_with_last_event_id {
        if let Some(id) = request.last_event_id {
            builder = builder.header(LAST_EVENT_ID, id);
        }
    }

    let response = timeout(config.connect_timeout, builder.send())
        .await
        .map_err(|_| StreamError::Timeout(config.connect_timeout))??;

    let status = response.status();
    if !status.is_success() {
        return Err(StreamError::HttpStatus { status });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();

    if !content_type.contains(TEXT_EVENT_STREAM) {
        let snippet = read_snippet(response, config.snippet_len).await;
        warn!(content_type = %content_type, snippet = %snippet, "Non-SSE response from event-stream endpoint");
        return Err(StreamError::ProtocolMismatch { content_type, snippet });
    }

    debug!(url = %request.url, "SSE response validated");
    Ok(response)
}

/// Reads at most `max_chars` characters of the body for diagnostics, giving up after a short bound.
async fn read_snippet(response: Response, max_chars: usize) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    let read = async {
        while let Some(Ok(chunk)) = stream.next().await {
            body.extend_from_slice(&chunk);
            // Four bytes per char is the UTF-8 upper bound.
            if body.len() >= max_chars.saturating_mul(4) {
                break;
            }
        }
    };
    let _ = timeout(SNIPPET_READ_LIMIT, read).await;

    String::from_utf8_lossy(&body).chars().take(max_chars).collect()
}
