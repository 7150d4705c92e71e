use crate::auth::AuthSource;
use crate::backoff::Backoff;
use crate::config::StreamConfig;
use crate::connector::{self, ConnectRequest};
use crate::dispatch::{dispatch, EventHandler};
use crate::error::StreamError;
use crate::gate::GateKey;
use crate::stream::{parse_block, FrameReader};
use futures_util::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of the client's connection, as published on its state channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting { attempt: u32 },
    Open,
    Failed,
    Reconnecting { attempt: u32, delay: Duration },
    Cancelled,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Everything a session task needs, shared by all sessions of one client.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub http: Client,
    pub config: Arc<StreamConfig>,
    pub auth: Arc<dyn AuthSource>,
    pub handler: Arc<dyn EventHandler>,
    pub state: Arc<watch::Sender<ConnectionState>>,
}

impl SessionContext {
    /// Publishes `state` unless the session is cancelled. The check runs under the channel's
    /// write lock, so a teardown's `Cancelled` is never overwritten by a late transition.
    fn publish(&self, cancel: &CancellationToken, state: ConnectionState) -> bool {
        self.state.send_if_modified(|current| {
            if cancel.is_cancelled() {
                return false;
            }
            *current = state;
            true
        })
    }
}

/// The live connection: one task that connects, reads, dispatches and reconnects until cancelled.
pub(crate) struct Session {
    pub key: GateKey,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Session {
    pub fn spawn(runtime: &Handle, ctx: SessionContext, key: GateKey) -> Self {
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run(ctx, cancel.clone()));
        Self { key, cancel, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the session. The in-flight request, body stream and any pending reconnect timer
    /// are dropped at the task's next suspension point; nothing is dispatched after this call.
    pub fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

async fn run(ctx: SessionContext, cancel: CancellationToken) {
    let mut backoff = Backoff::new(ctx.config.reconnect_base_delay, ctx.config.reconnect_max_delay);
    let mut last_event_id: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        ctx.publish(&cancel, ConnectionState::Connecting { attempt: backoff.attempt() });

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = attempt(&ctx, &cancel, &mut backoff, &mut last_event_id) => outcome,
        };

        let err = match outcome {
            Ok(()) => break,
            Err(err) => err,
        };

        if cancel.is_cancelled() {
            break;
        }

        warn!(error = %err, status = ?err.status(), "SSE error");
        ctx.publish(&cancel, ConnectionState::Failed);
        ctx.handler.on_error(&err);

        if cancel.is_cancelled() {
            break;
        }

        let delay = backoff.next_delay();
        info!(attempt = backoff.attempt(), delay_ms = delay.as_millis() as u64, "SSE reconnecting after backoff");
        ctx.publish(&cancel, ConnectionState::Reconnecting { attempt: backoff.attempt(), delay });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("SSE session finished");
}

/// One connect-and-read cycle. Returns `Ok(())` only when the session was cancelled mid-attempt;
/// every other exit is a failure that feeds the backoff.
async fn attempt(
    ctx: &SessionContext,
    cancel: &CancellationToken,
    backoff: &mut Backoff,
    last_event_id: &mut Option<String>,
) -> Result<(), StreamError> {
    let url = ctx.config.url();
    let token = ctx.auth.access_token();

    debug!(url = %url, attempt = backoff.attempt(), "SSE connecting");
    let request = ConnectRequest { url: &url, token: token.as_deref(), last_event_id: last_event_id.as_deref() };
    let response = connector::connect(&ctx.http, request, &ctx.config).await?;

    if cancel.is_cancelled() {
        return Ok(());
    }

    info!(url = %url, "SSE ready");
    ctx.publish(cancel, ConnectionState::Open);
    ctx.handler.on_open();
    backoff.reset();

    let mut reader = FrameReader::new();
    let mut body = response.bytes_stream();

    loop {
        let chunk = match body.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(StreamError::Network(e)),
            None => {
                let discarded = reader.finish();
                if discarded > 0 {
                    debug!(discarded, "SSE stream ended inside an event block");
                }
                return Err(StreamError::StreamClosed);
            }
        };

        if cancel.is_cancelled() {
            return Ok(());
        }
        reader.push(&chunk);

        while let Some(block) = reader.next_block() {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let event = parse_block(&block);
            if let Some(id) = &event.id {
                *last_event_id = Some(id.clone());
            }
            dispatch(ctx.handler.as_ref(), event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthStore;
    use crate::dispatch::ChannelHandler;

    fn context() -> SessionContext {
        let (handler, _rx) = ChannelHandler::channel();
        let (state, _) = watch::channel(ConnectionState::Idle);
        SessionContext {
            http: Client::new(),
            config: Arc::new(StreamConfig::default()),
            auth: Arc::new(AuthStore::new()),
            handler: Arc::new(handler),
            state: Arc::new(state),
        }
    }

    #[test]
    fn test_cancelled_session_keeps_teardown_state() {
        let ctx = context();
        let cancel = CancellationToken::new();
        assert!(ctx.publish(&cancel, ConnectionState::Open));

        cancel.cancel();
        ctx.state.send_replace(ConnectionState::Cancelled);

        let late = ConnectionState::Reconnecting { attempt: 1, delay: Duration::from_secs(1) };
        assert!(!ctx.publish(&cancel, late));
        assert!(!ctx.publish(&cancel, ConnectionState::Failed));
        assert_eq!(*ctx.state.borrow(), ConnectionState::Cancelled);
    }

    #[test]
    fn test_teardown_from_another_thread_is_final() {
        for _ in 0..200 {
            let ctx = context();
            let cancel = CancellationToken::new();

            let session = {
                let ctx = ctx.clone();
                let cancel = cancel.clone();
                std::thread::spawn(move || {
                    while ctx.publish(&cancel, ConnectionState::Open) {
                        ctx.publish(&cancel, ConnectionState::Failed);
                    }
                })
            };

            cancel.cancel();
            ctx.state.send_replace(ConnectionState::Cancelled);
            session.join().unwrap();

            assert_eq!(*ctx.state.borrow(), ConnectionState::Cancelled);
        }
    }
}
