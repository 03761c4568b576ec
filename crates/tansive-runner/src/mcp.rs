//! MCP stdio runner (C9, §4.9): a long-lived child process speaking MCP,
//! dispatched per skill invocation via `tools/call`, and the proxy-session
//! registration half of §4.9's `NewMCPSession`.
//!
//! Grounded in the teacher's `astralis-mcp::server::ServerManager` (spawn via
//! `TokioChildProcess` + `ServiceExt::serve`, cache the resulting
//! `RunningService`, call through a cloned `Peer`) and `astrid-mcp::client`
//! (`CallToolRequestParams` construction, `ToolResult`-shaped conversion).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParams, ClientCapabilities, ClientInfo, Implementation, ProtocolVersion,
};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde::Deserialize;
use serde_json::Value;
use tansive_core::{InvocationId, SessionId};
use tansive_policy::View;
use tansive_session::{McpProxyRegistrar, RunnerContext, SkillRunner};
use tokio::sync::RwLock;

use crate::error::{RunnerError, RunnerResult};

/// `Source.config` shape for a `RunnerKind::McpStdio` source (§4.9).
#[derive(Clone, Debug, Deserialize)]
pub struct McpStdioConfig {
    /// The MCP server executable.
    pub command: String,
    /// Arguments passed to the server.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables layered onto the process env.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A client handler with no server-initiated capabilities (sampling, roots,
/// elicitation); the skill runner never needs the server to call back into
/// it, so every capability is declared absent in `get_info` and every
/// request falls through to `rmcp`'s default "not supported" behavior.
struct PassiveClientHandler;

impl rmcp::ClientHandler for PassiveClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo {
            meta: None,
            protocol_version: ProtocolVersion::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "tansive-runtime".to_string(),
                title: Some("Tansive Runtime".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
        }
    }
}

type McpService = RunningService<RoleClient, PassiveClientHandler>;

/// Spawns and caches one long-lived MCP child process per source name,
/// dispatching `tools/call` for skill invocations bound to it.
pub struct McpRunner {
    /// Connected servers, keyed by source name.
    connections: RwLock<HashMap<String, Arc<McpService>>>,
}

impl Default for McpRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl McpRunner {
    /// Build an empty runner; servers are connected lazily on first use.
    #[must_use]
    pub fn new() -> Self {
        Self { connections: RwLock::new(HashMap::new()) }
    }

    async fn connect(&self, source_name: &str, config: &McpStdioConfig) -> RunnerResult<Arc<McpService>> {
        if let Some(existing) = self.connections.read().await.get(source_name) {
            if !existing.is_closed() {
                return Ok(Arc::clone(existing));
            }
        }

        let mut command = tokio::process::Command::new(&config.command);
        command.args(&config.args).envs(&config.env);

        let transport = TokioChildProcess::new(command)
            .map_err(|e| RunnerError::McpSessionFailed(format!("spawning {}: {e}", config.command)))?;

        let service = PassiveClientHandler
            .serve(transport)
            .await
            .map_err(|e| RunnerError::McpSessionFailed(format!("handshake with {}: {e}", config.command)))?;

        let service = Arc::new(service);
        self.connections.write().await.insert(source_name.to_string(), Arc::clone(&service));
        Ok(service)
    }

    /// List every tool the named source's MCP server currently exposes
    /// (§4.9 `FetchTools`).
    pub async fn fetch_tools(&self, source_name: &str, config: &McpStdioConfig) -> RunnerResult<Vec<rmcp::model::Tool>> {
        let service = self.connect(source_name, config).await?;
        service
            .list_all_tools()
            .await
            .map_err(|e| RunnerError::McpCallFailed(e.to_string()))
    }

    /// Invoke `tool_name` on the named source's MCP server with `args`
    /// (§4.9 `RunMCP`).
    pub async fn call_tool(&self, source_name: &str, config: &McpStdioConfig, tool_name: &str, args: Value) -> RunnerResult<Value> {
        let service = self.connect(source_name, config).await?;

        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                Some(map)
            }
        };

        let params = CallToolRequestParams {
            meta: None,
            name: std::borrow::Cow::Owned(tool_name.to_string()),
            arguments,
            task: None,
        };

        let result = service
            .peer()
            .clone()
            .call_tool(params)
            .await
            .map_err(|e| RunnerError::McpCallFailed(e.to_string()))?;

        Ok(call_tool_result_to_value(&result))
    }

    async fn dispatch(&self, ctx: RunnerContext<'_>) -> RunnerResult<Value> {
        let config: McpStdioConfig =
            serde_json::from_value(ctx.source.config.clone()).map_err(|e| RunnerError::InvalidConfig(e.to_string()))?;
        self.call_tool(&ctx.source.name, &config, &ctx.skill.name, ctx.args).await
    }
}

#[async_trait]
impl SkillRunner for McpRunner {
    async fn run(&self, ctx: RunnerContext<'_>) -> Result<Value, String> {
        self.dispatch(ctx).await.map_err(|e| e.to_string())
    }

    async fn cancel_session(&self, _session_id: SessionId) {
        // MCP child processes are shared across sessions on a source, so an
        // individual session's stop does not tear down the connection.
    }
}

/// One registered MCP proxy session: the view a proxied `tools/call` must
/// be authorized against, keyed by the random path segment handed back to
/// the caller (§4.9 `NewMCPSession`).
#[derive(Clone)]
pub struct McpProxySession {
    /// The view that every call arriving on this proxy session is bound to.
    pub invoker_view: View,
    /// The session this proxy was registered for.
    pub session_id: SessionId,
    /// The invocation this proxy was opened on behalf of, re-used as the
    /// `invoker_id` for every proxied `tools/call` so call-graph depth and
    /// policy resolution match a direct invocation (`None` for a
    /// session-root-opened proxy).
    pub invoker_id: Option<InvocationId>,
}

/// Registers and looks up MCP proxy sessions; the actual
/// `/session/<rand>/mcp` HTTP route lives in `tansive-runtime` and consults
/// this registry to resolve an incoming path segment back to a view before
/// evaluating policy and dispatching through [`McpRunner`].
#[derive(Default)]
pub struct McpProxyRegistry {
    sessions: RwLock<HashMap<String, McpProxySession>>,
}

impl McpProxyRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }

    /// Resolve a `/session/<rand>/mcp` path segment back to its session.
    pub async fn lookup(&self, token: &str) -> Option<McpProxySession> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Drop every proxy session registered for `session_id` (§4.6 `Stop`).
    pub async fn revoke_session(&self, session_id: SessionId) {
        self.sessions.write().await.retain(|_, s| s.session_id != session_id);
    }
}

#[async_trait]
impl McpProxyRegistrar for McpProxyRegistry {
    async fn register(&self, session_id: SessionId, invoker_view: View, invoker_id: Option<InvocationId>) -> Result<String, String> {
        let token = random_hex_token();
        self.sessions
            .write()
            .await
            .insert(token.clone(), McpProxySession { invoker_view, session_id, invoker_id });
        Ok(format!("/session/{token}/mcp"))
    }
}

/// A random 64-character hex token, unguessable enough to stand in for the
/// proxy session's path segment (§4.9).
fn random_hex_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Convert an MCP `tools/call` result into the skill's JSON output,
/// matching §4.9: a tool-reported error is not a Rust `Err` (the transport
/// call succeeded), it is returned as the output payload with an `isError`
/// marker, same as the proxy surfaces it over HTTP.
fn call_tool_result_to_value(result: &rmcp::model::CallToolResult) -> Value {
    let is_error = result.is_error.unwrap_or(false);
    let text: Vec<Value> = result
        .content
        .iter()
        .map(|c| match &**c {
            rmcp::model::RawContent::Text(t) => Value::String(t.text.clone()),
            other => serde_json::to_value(other).unwrap_or(Value::Null),
        })
        .collect();

    Value::Object(
        [
            ("isError".to_string(), Value::Bool(is_error)),
            ("content".to_string(), Value::Array(text)),
        ]
        .into_iter()
        .collect(),
    )
}
