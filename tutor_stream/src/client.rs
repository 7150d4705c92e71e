use crate::auth::AuthSource;
use crate::config::StreamConfig;
use crate::dispatch::EventHandler;
use crate::error::SetupError;
use crate::gate::{GateDecision, GateInputs};
use crate::session::{ConnectionState, Session, SessionContext};
use reqwest::ClientBuilder;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct Control {
    enabled: bool,
    allowed_roles: Vec<String>,
    session: Option<Session>,
}

struct Shared {
    ctx: SessionContext,
    runtime: Handle,
    control: Mutex<Control>,
    shutdown: CancellationToken,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reconcile(&self) {
        let mut control = self.control();

        let decision = if self.shutdown.is_cancelled() {
            None
        } else {
            Some(GateInputs::collect(control.enabled, &control.allowed_roles, self.ctx.auth.as_ref()).evaluate())
        };

        match decision {
            Some(GateDecision::Open(key)) => {
                if let Some(session) = &control.session {
                    if session.key == key && !session.is_finished() {
                        return;
                    }
                }
                if let Some(previous) = control.session.take() {
                    debug!("SSE gate inputs changed, replacing session");
                    previous.stop();
                }
                debug!(key = %key, "SSE gate open");
                control.session = Some(Session::spawn(&self.runtime, self.ctx.clone(), key));
            }
            Some(GateDecision::Closed(reason)) => {
                if let Some(previous) = control.session.take() {
                    previous.stop();
                    self.ctx.state.send_replace(ConnectionState::Cancelled);
                    info!(reason = %reason, "SSE connection closed");
                }
            }
            None => {
                if let Some(previous) = control.session.take() {
                    previous.stop();
                    info!("SSE connection closed");
                }
                self.ctx.state.send_replace(ConnectionState::Cancelled);
            }
        }
    }
}

/// Gated, self-reconnecting client for one `text/event-stream` endpoint.
///
/// The client holds at most one live session. Call [`reconcile`](SseClient::reconcile) (or
/// change an input through the setters, or attach an auth watch) to start it; it stops as soon
/// as the gate closes and when the client is dropped.
pub struct SseClient {
    shared: Arc<Shared>,
}

impl SseClient {
    /// Must be called from within a Tokio runtime; sessions are spawned on it.
    pub fn new(
        config: StreamConfig,
        auth: Arc<dyn AuthSource>,
        handler: impl EventHandler,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| SetupError::Config(format!("No Tokio runtime: {}", e)))?;
        let http = ClientBuilder::new().connect_timeout(config.connect_timeout).build()?;

        let (state, _) = watch::channel(ConnectionState::Idle);
        let control =
            Control { enabled: config.enabled, allowed_roles: config.allowed_roles.clone(), session: None };

        let ctx = SessionContext {
            http,
            config: Arc::new(config),
            auth,
            handler: Arc::new(handler),
            state: Arc::new(state),
        };

        Ok(Self {
            shared: Arc::new(Shared { ctx, runtime, control: Mutex::new(control), shutdown: CancellationToken::new() }),
        })
    }

    /// Re-evaluates the gate and starts, keeps, replaces or stops the session accordingly.
    /// Never blocks on the network.
    pub fn reconcile(&self) {
        self.shared.reconcile();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.shared.control().enabled = enabled;
        self.shared.reconcile();
    }

    pub fn set_allowed_roles(&self, allowed_roles: Vec<String>) {
        self.shared.control().allowed_roles = allowed_roles;
        self.shared.reconcile();
    }

    /// Re-runs the gate whenever `changes` ticks, e.g. with `AuthStore::subscribe()`.
    /// The watcher ends with the client.
    pub fn watch_auth<T>(&self, mut changes: watch::Receiver<T>)
    where
        T: Send + Sync + 'static,
    {
        let shared = Arc::clone(&self.shared);
        self.shared.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shared.shutdown.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        shared.reconcile();
                    }
                }
            }
            debug!("SSE auth watcher stopped");
        });
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.ctx.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.ctx.state.subscribe()
    }

    /// Whether a session currently exists (connecting, open or waiting to reconnect).
    pub fn is_active(&self) -> bool {
        self.shared.control().session.is_some()
    }

    /// Stops the session and every watcher for good.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.shared.reconcile();
    }
}

impl Drop for SseClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
