//! Route handlers for the three loopback routes (§4.10).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tansive_core::{InvocationId, SessionId};
use tansive_session::ActiveSessionManager;

/// Shared state every loopback handler reads from.
#[derive(Clone)]
pub struct LoopbackState {
    /// Every session active in this Runtime process.
    pub sessions: Arc<ActiveSessionManager>,
}

/// Build the loopback router (§4.10): `POST /skill-invocations`,
/// `GET /skills`, `GET /context`.
#[must_use]
pub fn router(state: LoopbackState) -> Router {
    Router::new()
        .route("/skill-invocations", post(post_skill_invocations))
        .route("/skills", get(get_skills))
        .route("/context", get(get_context))
        .with_state(state)
}

#[derive(Deserialize)]
struct SkillInvocationRequest {
    session_id: SessionId,
    invocation_id: InvocationId,
    skill_name: String,
    #[serde(default)]
    args: Value,
}

/// `POST /skill-invocations`: always 200, even on failure — the body's
/// `error` field is how callers learn of a rejection (§4.10).
async fn post_skill_invocations(State(state): State<LoopbackState>, Json(req): Json<SkillInvocationRequest>) -> Json<Value> {
    let Some(session) = state.sessions.get(req.session_id) else {
        return Json(json!({"error": "session not found"}));
    };

    let invocation_id = InvocationId::new();
    match session.run(Some(req.invocation_id), &req.skill_name, req.args, invocation_id).await {
        Ok(output) => Json(json!({
            "invocation_id": invocation_id,
            "output": {"content": content_envelope(output)},
        })),
        Err(err) => Json(json!({"error": err.to_string()})),
    }
}

/// Wrap a skill's raw JSON output as `{type, value}` (§4.10): strings that
/// parse as JSON are unwrapped one level so a skill returning a
/// JSON-encoded object still classifies as `object`/`array`/etc, not `text`.
fn content_envelope(value: Value) -> Value {
    if let Value::String(ref s) = value {
        if let Ok(parsed) = serde_json::from_str::<Value>(s) {
            if !parsed.is_string() {
                return content_envelope(parsed);
            }
        }
        return json!({"type": "text", "value": value});
    }
    let kind = match &value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::String(_) => unreachable!("strings handled above"),
    };
    json!({"type": kind, "value": value})
}

#[derive(Deserialize)]
struct SessionQuery {
    session_id: SessionId,
}

/// `GET /skills?session_id=`.
async fn get_skills(State(state): State<LoopbackState>, Query(q): Query<SessionQuery>) -> Json<Value> {
    let Some(session) = state.sessions.get(q.session_id) else {
        return Json(json!({"error": "session not found"}));
    };
    match session.list_skills() {
        Ok(skills) => Json(json!({"skills": skills})),
        Err(err) => Json(json!({"error": err.to_string()})),
    }
}

#[derive(Deserialize)]
struct ContextQuery {
    session_id: SessionId,
    /// Reserved for future invoker-scoped context slots; the current
    /// slot model is session-wide, not per-invocation.
    #[serde(default)]
    #[allow(dead_code)]
    invocation_id: Option<InvocationId>,
    name: String,
}

/// `GET /context?session_id=&invocation_id=&name=`.
async fn get_context(State(state): State<LoopbackState>, Query(q): Query<ContextQuery>) -> Json<Value> {
    let Some(session) = state.sessions.get(q.session_id) else {
        return Json(json!({"error": "session not found"}));
    };
    match session.context_slot(&q.name) {
        Ok(value) => Json(json!({"name": q.name, "value": value})),
        Err(err) => Json(json!({"error": err.to_string()})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use hyper::{Request, StatusCode};
    use std::collections::BTreeMap;
    use tansive_catalog::{ContextSlot, InMemoryCatalog, RunnerKind, SkillDef, SkillSet, Source};
    use tansive_core::{Action, ResourceUri, ViewId};
    use tansive_crypto::KeyPair;
    use tansive_events::EventBus;
    use tansive_policy::{Rule, Scope, View};
    use tansive_session::{CreateSessionParams, ExecutionState, McpProxyRegistrar, RunnerContext, SkillRunner};
    use tower::ServiceExt;

    struct EchoRunner;

    #[async_trait]
    impl SkillRunner for EchoRunner {
        async fn run(&self, ctx: RunnerContext<'_>) -> Result<Value, String> {
            Ok(json!({"ran": ctx.skill.name, "args": ctx.args}))
        }
    }

    struct NoopRegistrar;

    #[async_trait]
    impl McpProxyRegistrar for NoopRegistrar {
        async fn register(&self, _session_id: SessionId, _invoker_view: View, _invoker_id: Option<InvocationId>) -> Result<String, String> {
            Ok("/session/deadbeef/mcp".into())
        }
    }

    fn allow_all_view() -> View {
        View::new(
            ViewId::new(),
            "dev",
            "tenant-1",
            Scope { catalog: "default".into(), variant: None, namespace: None },
            vec![Rule::allow(vec![Action::new("demo.run").unwrap()], vec![ResourceUri::parse("res://*").unwrap()])],
        )
    }

    async fn build_state() -> (LoopbackState, SessionId, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert_skillset(SkillSet {
            name: "demo".into(),
            version: "1.0.0".into(),
            sources: vec![Source { name: "noop".into(), runner: RunnerKind::Stdio, config: json!({}) }],
            context: vec![ContextSlot { name: "greeting".into(), schema: json!({"type": "string"}), value: json!("hello") }],
            skills: vec![SkillDef {
                name: "echo".into(),
                source: "noop".into(),
                input_schema: json!({}),
                output_schema: json!({}),
                exported_actions: vec![Action::new("demo.run").unwrap()],
                annotations: BTreeMap::new(),
                transform: None,
            }],
            dependencies: vec![],
        });

        let session_id = SessionId::new();
        catalog
            .create_session(tansive_catalog::SessionRecord::new(session_id, "tenant-1", "user-1", "default", ViewId::new()))
            .await
            .unwrap();

        let manager = Arc::new(ActiveSessionManager::new());
        let session = manager
            .create_session(CreateSessionParams {
                session_id,
                execution_state: ExecutionState {
                    skillset_name: "demo".into(),
                    skill_name: "echo".into(),
                    view: allow_all_view(),
                    session_variables: json!({}),
                    input_args: json!({}),
                    scope: Scope { catalog: "default".into(), variant: None, namespace: None },
                    tenant_id: "tenant-1".into(),
                },
                audit_log_path: dir.path().join("session.tlog"),
                signing_key: KeyPair::generate(),
                flush_interval: 16,
                compress_threshold: 64 * 1024,
                max_call_depth: 3,
                runner: Arc::new(EchoRunner),
                mcp_registrar: Arc::new(NoopRegistrar),
                catalog: catalog as Arc<dyn tansive_catalog::CatalogStore>,
                events: Arc::new(EventBus::new()),
            })
            .unwrap();
        session.fetch_objects().await.unwrap();

        (LoopbackState { sessions: manager }, session_id, dir)
    }

    #[tokio::test]
    async fn skill_invocation_runs_and_returns_classified_output() {
        let (state, session_id, _dir) = build_state().await;
        let app = router(state);

        let body = json!({
            "session_id": session_id,
            "invocation_id": InvocationId::new(),
            "skill_name": "echo",
            "args": {"x": 1}
        });
        let request = Request::builder()
            .method("POST")
            .uri("/skill-invocations")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.get("error").is_none());
        assert_eq!(parsed["output"]["content"]["type"], json!("object"));
        assert_eq!(parsed["output"]["content"]["value"]["ran"], json!("echo"));
    }

    #[tokio::test]
    async fn skill_invocation_against_unknown_session_reports_error_with_200() {
        let (_state, _session_id, _dir) = build_state().await;
        let empty_state = LoopbackState { sessions: Arc::new(ActiveSessionManager::new()) };
        let app = router(empty_state);

        let body = json!({"session_id": SessionId::new(), "invocation_id": InvocationId::new(), "skill_name": "echo", "args": {}});
        let request = Request::builder()
            .method("POST")
            .uri("/skill-invocations")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["error"], json!("session not found"));
    }

    #[tokio::test]
    async fn context_slot_is_readable_by_name() {
        let (state, session_id, _dir) = build_state().await;
        let app = router(state);

        let uri = format!("/context?session_id={session_id}&name=greeting");
        let request = Request::builder().method("GET").uri(uri).body(axum::body::Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["value"], json!("hello"));
    }

    #[test]
    fn content_envelope_classifies_plain_values() {
        assert_eq!(content_envelope(json!(null))["type"], json!("null"));
        assert_eq!(content_envelope(json!(true))["type"], json!("boolean"));
        assert_eq!(content_envelope(json!(3))["type"], json!("number"));
        assert_eq!(content_envelope(json!([1, 2]))["type"], json!("array"));
        assert_eq!(content_envelope(json!("plain text"))["type"], json!("text"));
    }

    #[test]
    fn content_envelope_unwraps_json_encoded_strings() {
        let value = content_envelope(Value::String(r#"{"a":1}"#.to_string()));
        assert_eq!(value["type"], json!("object"));
        assert_eq!(value["value"]["a"], json!(1));
    }
}
