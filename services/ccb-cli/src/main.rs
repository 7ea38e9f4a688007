//! CCB command-line client
//!
//! Two commands:
//! 1. `authorize` runs the browser consent flow and saves the token
//! 2. `call` sends one authenticated API request, refreshing the saved
//!    token first when it is about to expire, and prints the raw body

mod cli;
mod config;

use anyhow::{Context, Result};
use ccb_api::ApiClient;
use ccb_auth::{Authorizer, Token, TokenStore};
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{Method, ReqwestTransport, Transport};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries API bodies only, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse(std::env::args().skip(1))?;

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        client_id = %config.oauth.client_id,
        subdomain = %config.oauth.subdomain,
        api_base = %config.endpoints.api_base,
        token_path = %config.client.token_path.display(),
        "configuration loaded"
    );

    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(
        reqwest::Client::new(),
        config.request_timeout(),
    ));
    let store = TokenStore::new(&config.client.token_path);

    match cli.command {
        Command::Authorize => authorize(&config, transport, &store).await,
        Command::Call { method, path } => call(&config, transport, &store, method, &path).await,
    }
}

async fn authorize(config: &Config, transport: Arc<dyn Transport>, store: &TokenStore) -> Result<()> {
    let mut credentials = config.credentials()?;
    let authorizer = Authorizer::new(
        transport,
        config.endpoints.clone(),
        config.authorizer_config(),
    );

    let token = authorizer
        .authorize(&mut credentials)
        .await
        .context("authorization failed")?;

    store
        .save(&token)
        .await
        .with_context(|| format!("failed to save token to {}", store.path().display()))?;

    info!(path = %store.path().display(), "authorization complete, token saved");
    println!("Authorization complete. Token saved to {}", store.path().display());
    Ok(())
}

async fn call(
    config: &Config,
    transport: Arc<dyn Transport>,
    store: &TokenStore,
    method: Method,
    path: &str,
) -> Result<()> {
    let credentials = config.credentials()?;
    let mut token = store
        .load()
        .await
        .with_context(|| format!("failed to load token from {}", store.path().display()))?
        .with_context(|| {
            format!(
                "no token at {}; run `ccb authorize` first",
                store.path().display()
            )
        })?;

    let before = token.clone();
    let client = ApiClient::new(transport, config.endpoints.clone());
    let result = client.call(method, path, &mut token, &credentials).await;

    // A refresh rotates the refresh token, so save it even if the call failed
    persist_if_changed(store, &before, &token).await?;

    let body = result.context("API call failed")?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;
    Ok(())
}

async fn persist_if_changed(store: &TokenStore, before: &Token, after: &Token) -> Result<()> {
    if before == after {
        return Ok(());
    }
    store
        .save(after)
        .await
        .with_context(|| format!("failed to save refreshed token to {}", store.path().display()))?;
    info!(path = %store.path().display(), "refreshed token saved");
    Ok(())
}
