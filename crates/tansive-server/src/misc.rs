//! `/.well-known/jwks.json`, `/version`, `/ready`.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tansive_token::JwksDocument;

use crate::state::AppState;

/// Build the misc router.
#[must_use]
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/.well-known/jwks.json", get(jwks))
        .route("/version", get(version))
        .route("/ready", get(ready))
}

async fn jwks(State(state): State<AppState>) -> Json<JwksDocument> {
    Json(state.tokens.jwks())
}

async fn version() -> Json<Value> {
    Json(json!({"version": env!("CARGO_PKG_VERSION")}))
}

/// Readiness is unconditional once the process is serving: the catalog and
/// token service are both constructed before the listener binds.
async fn ready(State(_state): State<AppState>) -> Json<Value> {
    Json(json!({"ready": true}))
}
