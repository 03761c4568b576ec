//! Shared state every Server handler reads from.

use std::collections::HashMap;
use std::sync::RwLock;

use tansive_catalog::CatalogStore;
use tansive_config::ServerConfig;
use tansive_core::SessionId;
use tansive_session::{AuthCodeStore, ExecutionState};
use tansive_token::TokenService;

use std::sync::Arc;

/// Everything a Server handler needs.
#[derive(Clone)]
pub struct AppState {
    /// The catalog object store (views, skillsets, session records, audit blobs).
    pub catalog: Arc<dyn CatalogStore>,
    /// The Ed25519 token-signing service.
    pub tokens: Arc<TokenService>,
    /// Outstanding single-use PKCE auth codes.
    pub auth_codes: Arc<AuthCodeStore>,
    /// The `ExecutionState` each pending/running session was created with,
    /// keyed by session id.
    ///
    /// This is ephemeral, pre-execution data the Runtime fetches exactly
    /// once per session — it has no place in [`CatalogStore`], whose
    /// records persist a session's durable identity and status, not its
    /// one-shot execution payload.
    pub execution_states: Arc<RwLock<HashMap<SessionId, ExecutionState>>>,
    /// The Runtime base URL handed out as `tangent_url` (§4.5 step 3).
    pub tangent_url: String,
    /// This server's static configuration.
    pub config: ServerConfig,
}

impl AppState {
    /// Record the `ExecutionState` a newly created session will be fetched
    /// with once its PKCE code is redeemed.
    pub fn put_execution_state(&self, session_id: SessionId, state: ExecutionState) {
        self.execution_states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id, state);
    }

    /// Fetch a session's recorded `ExecutionState`.
    #[must_use]
    pub fn get_execution_state(&self, session_id: SessionId) -> Option<ExecutionState> {
        self.execution_states.read().unwrap_or_else(|e| e.into_inner()).get(&session_id).cloned()
    }
}
