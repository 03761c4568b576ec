//! Tansive Runtime ("Tangent"): the execution-host binary (C1, C6, C8, C9,
//! C10, C11 runtime side).
//!
//! Binds two listeners: a TCP listener serving this crate's own HTTP
//! surface (session creation/streaming, stop, MCP proxy), and a Unix
//! domain socket serving `tansive-loopback`'s skill-service API that a
//! running skill's child process re-enters the session core through.

#![deny(unsafe_code)]
#![deny(clippy::all)]

mod error;
mod mcp_proxy;
mod misc;
mod router;
mod seed;
mod server_client;
mod sessions;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tansive_catalog::InMemoryCatalog;
use tansive_config::Config;
use tansive_events::EventBus;
use tansive_loopback::LoopbackState;
use tansive_runner::McpProxyRegistry;
use tansive_session::ActiveSessionManager;
use tracing_subscriber::EnvFilter;

use crate::state::{AppState, CompositeRunner};

/// The Tansive Runtime daemon.
#[derive(Parser, Debug)]
#[command(name = "tansive-runtime", version)]
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
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,tansive_runtime=info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load(cli.workspace.as_deref())?,
    };

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let runtime = config.runtime.clone();
    std::fs::create_dir_all(&runtime.working_dir)?;
    std::fs::create_dir_all(&runtime.audit_dir)?;
    std::fs::create_dir_all(&runtime.trusted_script_dir)?;

    let local_catalog = Arc::new(InMemoryCatalog::new());
    seed::load_skillsets(&runtime.working_dir, &local_catalog)?;

    let tmp_root = runtime.working_dir.join("run").join("homes");
    let state = AppState {
        sessions: Arc::new(ActiveSessionManager::new()),
        local_catalog,
        runner: Arc::new(CompositeRunner::new(runtime.trusted_script_dir.clone(), tmp_root)),
        mcp_proxies: Arc::new(McpProxyRegistry::new()),
        events: Arc::new(EventBus::new()),
        http: reqwest::Client::new(),
        config: runtime.clone(),
    };

    let loopback_state = LoopbackState { sessions: Arc::clone(&state.sessions) };
    let loopback_app = tansive_loopback::router(loopback_state);
    let loopback_socket = runtime.working_dir.join("run").join("tangent.service");
    tokio::spawn(async move {
        if let Err(err) = tansive_loopback::serve_unix(&loopback_socket, loopback_app).await {
            tracing::error!(error = %err, "loopback server exited");
        }
    });

    let app = router::app(state);
    let addr = format!("{}:{}", runtime.host, runtime.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "tansive-runtime listening");

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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use hyper::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        AppState {
            sessions: Arc::new(ActiveSessionManager::new()),
            local_catalog: Arc::new(InMemoryCatalog::new()),
            runner: Arc::new(CompositeRunner::new(dir.path().join("scripts"), dir.path().join("homes"))),
            mcp_proxies: Arc::new(McpProxyRegistry::new()),
            events: Arc::new(EventBus::new()),
            http: reqwest::Client::new(),
            config: Config::default().runtime,
        }
    }

    async fn call(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { serde_json::json!(null) } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn ready_and_version_respond() {
        let app = router::app(test_state());
        let (status, _) = call(&app, "GET", "/ready").await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, "GET", "/version").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn unknown_mcp_proxy_token_is_not_found() {
        let app = router::app(test_state());
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/session/deadbeef/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
