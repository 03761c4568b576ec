//! `/session/<rand>/mcp` (C9, §4.9): a JSON-RPC 2.0 proxy exposing a
//! session's skillset as MCP tools, policy- and transform-gated through
//! the same [`tansive_session::Session::run`] path a direct invocation
//! takes.
//!
//! `tools/list` is scoped to the invoker's own source unless the invoking
//! skill is annotated `mcp:tools = "no-filter"` (§8 S6): the invoker's
//! skill name is recovered from the call graph via
//! [`Session::invoker_skill_name`], then matched against its own `source`
//! field to filter the rest of the skillset. A root call (no invoker)
//! has no source to scope by and sees the whole, policy-filtered
//! skillset. See `DESIGN.md`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tansive_core::InvocationId;
use tansive_session::Session;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the MCP proxy router.
#[must_use]
pub fn router() -> Router<AppState> {
    Router::new().route("/session/:token/mcp", post(handle_rpc))
}

#[derive(Deserialize)]
struct RpcRequest {
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn method_not_found(id: Value, method: &str) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(RpcError { code: -32601, message: format!("method not found: {method}") }) }
    }
}

/// `POST /session/<rand>/mcp`: dispatches `tools/list`/`tools/call`
/// (§4.9). Resolving an unknown proxy token is the one case that does
/// surface as an HTTP error — everything past that point is JSON-RPC.
async fn handle_rpc(State(state): State<AppState>, Path(token): Path<String>, Json(request): Json<RpcRequest>) -> Result<Json<RpcResponse>, ApiError> {
    let proxy = state
        .mcp_proxies
        .lookup(&token)
        .await
        .ok_or_else(|| ApiError(tansive_core::TansiveError::NotFound(format!("no mcp proxy session for {token}"))))?;

    let session = state
        .sessions
        .get(proxy.session_id)
        .ok_or_else(|| ApiError(tansive_core::TansiveError::NotFound(format!("session not found: {}", proxy.session_id))))?;

    let response = match request.method.as_str() {
        "tools/list" => RpcResponse::ok(request.id, list_tools(&session, proxy.invoker_id)),
        "tools/call" => RpcResponse::ok(request.id, call_tool(&session, proxy.invoker_id, request.params).await),
        other => RpcResponse::method_not_found(request.id, other),
    };
    Ok(Json(response))
}

/// Every skill the proxy's invoker is currently allowed to run and that
/// passes the invoker's source-scoping annotation, shaped as MCP
/// `tools/list` results (§4.9, §8 S6).
fn list_tools(session: &Arc<Session>, invoker_id: Option<InvocationId>) -> Value {
    let Ok(skills) = session.list_skills() else {
        return json!({"tools": []});
    };

    let invoker_source = source_scope(session.invoker_skill_name(invoker_id), &skills);

    let tools: Vec<Value> = skills
        .into_iter()
        .filter(|skill| invoker_source.as_deref().is_none_or(|source| skill.source == source))
        .filter(|skill| matches!(session.validate_run_policy(invoker_id, &skill.name), Ok(tansive_policy::Decision::Allowed { .. })))
        .map(|skill| json!({"name": skill.name, "description": "", "inputSchema": skill.input_schema}))
        .collect();

    json!({"tools": tools})
}

/// The source name to scope `tools/list` by, or `None` for no filtering —
/// either a root call, an invoker the skillset no longer recognizes, or an
/// invoker annotated `mcp:tools = "no-filter"` (§8 S6).
fn source_scope(invoker_name: Option<String>, skills: &[tansive_catalog::SkillDef]) -> Option<String> {
    let invoker_name = invoker_name?;
    let invoker = skills.iter().find(|skill| skill.name == invoker_name)?;
    if invoker.annotations.get("mcp:tools").map(String::as_str) == Some("no-filter") {
        return None;
    }
    Some(invoker.source.clone())
}

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Dispatch a proxied `tools/call` through [`Session::run`], mapping any
/// rejection into an MCP `CallToolResult` with `isError: true` rather than
/// a transport-level failure (§4.9).
async fn call_tool(session: &Arc<Session>, invoker_id: Option<InvocationId>, params: Value) -> Value {
    let call: ToolCallParams = match serde_json::from_value(params) {
        Ok(call) => call,
        Err(err) => return error_result(format!("invalid tools/call params: {err}")),
    };

    let invocation_id = InvocationId::new();
    match session.run(invoker_id, &call.name, call.arguments, invocation_id).await {
        Ok(output) => json!({"isError": false, "content": [{"type": "text", "text": output.to_string()}]}),
        Err(err) => error_result(err.to_string()),
    }
}

fn error_result(message: String) -> Value {
    json!({"isError": true, "content": [{"type": "text", "text": message}]})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_found_sets_rpc_error() {
        let response = RpcResponse::method_not_found(json!(1), "nope");
        assert!(response.error.is_some());
        assert!(response.result.is_none());
    }

    #[test]
    fn error_result_is_marked_but_still_a_successful_rpc_result() {
        let value = error_result("denied".into());
        assert_eq!(value["isError"], json!(true));
    }

    fn skill(name: &str, source: &str, mcp_tools: Option<&str>) -> tansive_catalog::SkillDef {
        let mut annotations = std::collections::BTreeMap::new();
        if let Some(value) = mcp_tools {
            annotations.insert("mcp:tools".to_string(), value.to_string());
        }
        tansive_catalog::SkillDef {
            name: name.into(),
            source: source.into(),
            input_schema: json!({}),
            output_schema: json!({}),
            exported_actions: vec![],
            annotations,
            transform: None,
        }
    }

    /// §8 S6: an invoker without the `no-filter` annotation scopes to its
    /// own source.
    #[test]
    fn source_scope_filters_to_invokers_own_source_by_default() {
        let skills = vec![skill("inspect", "k8s", None), skill("billing", "stripe", None)];
        let scope = source_scope(Some("inspect".into()), &skills);
        assert_eq!(scope.as_deref(), Some("k8s"));
    }

    /// §8 S6: `mcp:tools = "no-filter"` disables source scoping entirely.
    #[test]
    fn no_filter_annotation_disables_source_scoping() {
        let skills = vec![skill("inspect", "k8s", Some("no-filter"))];
        let scope = source_scope(Some("inspect".into()), &skills);
        assert_eq!(scope, None);
    }

    #[test]
    fn root_call_has_no_source_to_scope_by() {
        let skills = vec![skill("inspect", "k8s", None)];
        assert_eq!(source_scope(None, &skills), None);
    }
}
