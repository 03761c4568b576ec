//! Shared state every Runtime handler reads from, plus the composite
//! [`SkillRunner`] that dispatches a skillset's mixed stdio/MCP sources to
//! the concrete runner that owns each one.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tansive_catalog::{CatalogStore, InMemoryCatalog, RunnerKind};
use tansive_config::RuntimeConfig;
use tansive_core::SessionId;
use tansive_events::EventBus;
use tansive_runner::{McpProxyRegistry, McpRunner, StdioRunner};
use tansive_session::{ActiveSessionManager, RunnerContext, SkillRunner};

/// Dispatches a `RunnerContext` to [`StdioRunner`] or [`McpRunner`]
/// depending on the invoked skill's `Source.runner` (§4.8, §4.9).
///
/// A skillset is free to mix both kinds of source; `CreateSessionParams`
/// takes a single `Arc<dyn SkillRunner>`, so this composite is what every
/// session is actually constructed with.
pub struct CompositeRunner {
    stdio: StdioRunner,
    mcp: McpRunner,
}

impl CompositeRunner {
    /// Build a composite runner over fresh stdio/MCP runners.
    #[must_use]
    pub fn new(trusted_script_dir: std::path::PathBuf, tmp_root: std::path::PathBuf) -> Self {
        Self {
            stdio: StdioRunner::new(trusted_script_dir, tmp_root, env!("CARGO_PKG_VERSION")),
            mcp: McpRunner::new(),
        }
    }
}

#[async_trait]
impl SkillRunner for CompositeRunner {
    async fn run(&self, ctx: RunnerContext<'_>) -> Result<Value, String> {
        match ctx.source.runner {
            RunnerKind::Stdio => self.stdio.run(ctx).await,
            RunnerKind::McpStdio => self.mcp.run(ctx).await,
        }
    }

    async fn cancel_session(&self, session_id: SessionId) {
        self.stdio.cancel_session(session_id).await;
        self.mcp.cancel_session(session_id).await;
    }
}

/// Everything a Runtime handler needs.
#[derive(Clone)]
pub struct AppState {
    /// Every session active in this Runtime process.
    pub sessions: Arc<ActiveSessionManager>,
    /// This Runtime's local catalog fake, seeded from the skillsets bundled
    /// alongside the workspace (full catalog CRUD is out of scope, §1).
    ///
    /// Kept as the concrete type (not just `Arc<dyn CatalogStore>`) because
    /// seeding (`insert_view`/`insert_skillset`) is not part of the trait.
    pub local_catalog: Arc<InMemoryCatalog>,
    /// The skill runner every session is constructed with.
    pub runner: Arc<CompositeRunner>,
    /// The MCP proxy-session registry backing `/session/<rand>/mcp`.
    pub mcp_proxies: Arc<McpProxyRegistry>,
    /// The event bus every session publishes its log onto.
    pub events: Arc<EventBus>,
    /// HTTP client used to call back to the Server (PKCE redemption,
    /// execution-state fetch, status PATCH).
    pub http: reqwest::Client,
    /// This Runtime's static configuration.
    pub config: RuntimeConfig,
}

impl AppState {
    /// Coerce [`Self::local_catalog`] to the trait object `Session`
    /// construction expects.
    #[must_use]
    pub fn catalog(&self) -> Arc<dyn CatalogStore> {
        Arc::clone(&self.local_catalog) as Arc<dyn CatalogStore>
    }
}
