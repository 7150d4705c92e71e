use crate::connector::resolve_url;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Signed-in user as returned by the backend. Only `role` is interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub role: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn with_role(role: impl Into<String>) -> Self {
        Self { role: role.into(), extra: Map::new() }
    }
}

/// Read-only view of the authentication state, queried at every gate evaluation and
/// every connection attempt.
pub trait AuthSource: Send + Sync + 'static {
    fn access_token(&self) -> Option<String>;
    fn current_user(&self) -> Option<User>;
    fn is_loading(&self) -> bool;
}

#[derive(Debug, Default)]
struct AuthState {
    token: Option<String>,
    user: Option<User>,
    loading: bool,
}

/// In-memory auth state with change notifications.
///
/// Every mutation bumps a revision published on a `watch` channel, so a client can
/// re-evaluate its gate whenever the token, user or loading flag changes.
pub struct AuthStore {
    state: RwLock<AuthState>,
    revision: watch::Sender<u64>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self { state: RwLock::new(AuthState::default()), revision }
    }

    /// A store that starts in the loading state, as during boot before the user is known.
    pub fn loading() -> Self {
        let store = Self::new();
        store.update(|state| state.loading = true);
        store
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn set_token(&self, token: Option<String>) {
        let token = token.filter(|t| !t.is_empty());
        self.update(|state| state.token = token);
    }

    pub fn clear_token(&self) {
        self.set_token(None);
    }

    pub fn set_user(&self, user: Option<User>) {
        self.update(|state| state.user = user);
    }

    pub fn set_loading(&self, loading: bool) {
        self.update(|state| state.loading = loading);
    }

    pub fn logout(&self) {
        self.update(|state| {
            state.user = None;
            state.token = None;
        });
    }

    fn update(&self, apply: impl FnOnce(&mut AuthState)) {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            apply(&mut state);
        }
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    fn read<T>(&self, get: impl FnOnce(&AuthState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        get(&state)
    }
}

impl AuthSource for AuthStore {
    fn access_token(&self) -> Option<String> {
        self.read(|state| state.token.clone())
    }

    fn current_user(&self) -> Option<User> {
        self.read(|state| state.user.clone())
    }

    fn is_loading(&self) -> bool {
        self.read(|state| state.loading)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MeResponse {
    Wrapped { data: User },
    Bare(User),
}

/// Loads the current user from `<base>/login/me` using the stored token.
///
/// Without a token the user is cleared. Any failure also clears the user; the token is kept.
/// The store reports `is_loading() == true` for the duration of the call.
pub async fn rehydrate_user(http: &Client, base_url: &str, store: &AuthStore) -> Option<User> {
    let Some(token) = store.access_token() else {
        store.update(|state| {
            state.user = None;
            state.loading = false;
        });
        return None;
    };

    store.set_loading(true);

    let url = resolve_url(base_url, "/login/me");
    let result = async {
        let response = http.get(&url).bearer_auth(&token).header("Accept", "application/json").send().await?;
        let response = response.error_for_status()?;
        response.json::<MeResponse>().await
    }
    .await;

    let user = match result {
        Ok(MeResponse::Wrapped { data }) | Ok(MeResponse::Bare(data)) => {
            debug!(role = %data.role, "Rehydrated current user");
            Some(data)
        }
        Err(e) => {
            warn!(error = %e, "Failed to rehydrate current user");
            None
        }
    };

    store.update(|state| {
        state.user = user.clone();
        state.loading = false;
    });

    user
}

/// Reloads the user through [`rehydrate_user`] every time the stored token changes.
///
/// Changes that leave the token as it was (user, loading flag) are ignored. The returned
/// future runs until the store is dropped, so callers usually spawn it and abort it on shutdown.
pub fn follow_token(
    http: Client,
    base_url: String,
    store: Arc<AuthStore>,
) -> impl Future<Output = ()> + Send + 'static {
    let mut changes = store.subscribe();
    let mut last_token = store.access_token();

    async move {
        while changes.changed().await.is_ok() {
            let token = store.access_token();
            if token == last_token {
                continue;
            }
            last_token = token;
            debug!("Token changed, reloading current user");
            rehydrate_user(&http, &base_url, &store).await;
        }
    }
}
