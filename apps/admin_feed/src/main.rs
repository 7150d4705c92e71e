use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tutor_stream::{follow_token, rehydrate_user, AuthStore, SseClient, User};

mod bridge;
mod config;

use bridge::BridgeHandler;
use config::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = args.load_config()?;

    let auth = Arc::new(AuthStore::loading());
    auth.set_token(args.token.clone());

    let follower = match &args.role {
        Some(role) => {
            auth.set_user(Some(User::with_role(role.clone())));
            auth.set_loading(false);
            None
        }
        None => {
            let http = reqwest::Client::new();
            match rehydrate_user(&http, &config.stream.base_url, &auth).await {
                Some(user) => info!("Signed in as {}", user.role),
                None => error!("No signed-in user, the feed stays closed"),
            }
            Some(tokio::spawn(follow_token(http, config.stream.base_url.clone(), Arc::clone(&auth))))
        }
    };

    let handler = BridgeHandler::new(config.notice_event.clone(), config.notice_message.clone());
    let client = SseClient::new(config.stream.clone(), auth.clone(), handler)?;
    client.watch_auth(auth.subscribe());
    client.reconcile();

    let mut state = client.subscribe_state();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal, exiting...");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                info!("Admin feed state: {:?}", *state.borrow());
            }
        }
    }

    client.shutdown();
    if let Some(follower) = follower {
        follower.abort();
    }
    Ok(())
}
