use crate::connector::resolve_url;
use crate::error::SetupError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Caller-owned settings for one event-stream client.
///
/// The bearer token is not stored here; it is read from the `AuthSource` at every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct StreamConfig {
    #[serde(default = "default_base_url")]
    #[builder(into, default = default_base_url())]
    pub base_url: String,
    #[serde(default = "default_endpoint")]
    #[builder(into, default = default_endpoint())]
    pub endpoint: String,
    #[serde(default = "default_allowed_roles")]
    #[builder(default = default_allowed_roles())]
    pub allowed_roles: Vec<String>,
    #[serde(default = "default_enabled")]
    #[builder(default = default_enabled())]
    pub enabled: bool,
    #[serde(default = "default_reconnect_base_delay", with = "humantime_serde")]
    #[builder(default = default_reconnect_base_delay())]
    pub reconnect_base_delay: Duration,
    #[serde(default = "default_reconnect_max_delay", with = "humantime_serde")]
    #[builder(default = default_reconnect_max_delay())]
    pub reconnect_max_delay: Duration,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    #[builder(default = default_connect_timeout())]
    pub connect_timeout: Duration,
    /// Characters of a non-SSE body kept for diagnostics.
    #[serde(default = "default_snippet_len")]
    #[builder(default = default_snippet_len())]
    pub snippet_len: usize,
    /// Send the last seen event id as `Last-Event-ID` when reconnecting.
    #[serde(default)]
    #[builder(default)]
    pub resume_with_last_event_id: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1:4000".to_string()
}

fn default_endpoint() -> String {
    "/admin/adminSSE".to_string()
}

fn default_allowed_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_enabled() -> bool {
    true
}

fn default_reconnect_base_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_reconnect_max_delay() -> Duration {
    Duration::from_millis(30_000)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_snippet_len() -> usize {
    300
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StreamConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let content = std::fs::read_to_string(path)?;
        let config: StreamConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Full stream URL: the endpoint verbatim when absolute, otherwise joined onto the base.
    pub fn url(&self) -> String {
        resolve_url(&self.base_url, &self.endpoint)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.reconnect_base_delay.is_zero() {
            return Err(SetupError::Config("Reconnect base delay must be > 0".to_string()));
        }
        if self.reconnect_max_delay < self.reconnect_base_delay {
            return Err(SetupError::Config("Reconnect max delay must be >= base delay".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(SetupError::Config("Connect timeout must be > 0".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(SetupError::Config("Endpoint must not be empty".to_string()));
        }
        Ok(())
    }
}
