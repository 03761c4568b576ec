//! Assembles the Runtime's own HTTP router (§6, §4.9, §4.11). The loopback
//! router (§4.10) is mounted separately, over a Unix socket, in `main.rs`.

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{mcp_proxy, misc, sessions};

/// Build the full Runtime app from its sub-routers.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(sessions::router())
        .merge(mcp_proxy::router())
        .merge(misc::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
