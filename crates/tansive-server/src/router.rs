//! Assembles the full Server router (§6 External Interfaces).

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{auth, misc, sessions};

/// Build the full Server app from its sub-routers.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(sessions::router())
        .merge(misc::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
