//! Resilient `text/event-stream` client for the tutoring platform's admin feed.
//!
//! The client opens a long-lived GET with a bearer token, parses SSE blocks as they arrive,
//! hands each event to an [`EventHandler`] and reconnects with capped exponential backoff.
//! Whether a connection may exist at all is decided by a gate over the enabled flag, the auth
//! state and a role allow-list.

pub mod auth;
pub mod backoff;
pub mod client;
pub mod config;
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod session;
pub mod stream;

pub use auth::{follow_token, rehydrate_user, AuthSource, AuthStore, User};
pub use client::SseClient;
pub use config::StreamConfig;
pub use dispatch::{ChannelHandler, EventHandler, EventMeta, Payload, StreamNotice};
pub use error::{SetupError, StreamError};
pub use session::ConnectionState;
pub use stream::ParsedEvent;

pub mod prelude {
    pub use crate::auth::{AuthSource, AuthStore, User};
    pub use crate::client::SseClient;
    pub use crate::config::StreamConfig;
    pub use crate::dispatch::{ChannelHandler, EventHandler, EventMeta, Payload, StreamNotice};
    pub use crate::error::{SetupError, StreamError};
    pub use crate::session::ConnectionState;
}
