//! Tansive Server: the control-plane binary (C4, C5, C11).
//!
//! Issues identity/access tokens, brokers PKCE grants between the CLI and
//! a Runtime, and tracks session records and finalized audit-log blobs in
//! the (out-of-scope, in-memory-faked) catalog store.

#![deny(unsafe_code)]
#![deny(clippy::all)]

mod auth;
mod error;
mod misc;
mod router;
mod sessions;
mod state;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use clap::Parser;
use tansive_catalog::{CatalogStore, InMemoryCatalog};
use tansive_config::Config;
use tansive_crypto::KeyPair;
use tansive_session::AuthCodeStore;
use tansive_token::TokenService;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

/// The Tansive control-plane daemon.
#[derive(Parser, Debug)]
#[command(name = "tansive-server", version)]
struct Cli {
    /// Load configuration from this file instead of the default layered
    /// discovery (system / user / workspace / env).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Project root to search for a `.tansive/config.toml` overlay.
    #[arg(long)]
    workspace: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,tansive_server=info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load(cli.workspace.as_deref())?,
    };

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let server = config.server.clone();
    let signing_key = KeyPair::load_or_generate(&server.signing_key_path)?;
    let issuer = format!("{}:{}", server.host, server.port);
    let tokens = Arc::new(TokenService::new(signing_key, issuer));

    let state = AppState {
        catalog: Arc::new(InMemoryCatalog::new()) as Arc<dyn CatalogStore>,
        tokens,
        auth_codes: Arc::new(AuthCodeStore::new()),
        execution_states: Arc::new(RwLock::new(HashMap::new())),
        tangent_url: config.runtime.tangent_url.clone(),
        config: server.clone(),
    };

    let app = router::app(state);
    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "tansive-server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutting down");
}
