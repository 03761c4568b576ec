//! `/sessions*` handlers (C1, C6, C11 runtime side, §4.5 steps 4-6, §4.11).
//!
//! Grounded in the teacher's `astrid-daemon` request-lifecycle shape
//! (redeem a handoff, construct a long-lived object, stream its output)
//! and, for the NDJSON body itself, `pagi-gateway`'s `async_stream::stream!`
//! + `Body::from_stream` chat-streaming handler.

use std::sync::Arc;

use async_stream::stream;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;
use tansive_catalog::{CatalogStore, SessionRecord, SessionSummary};
use tansive_core::{InvocationId, SessionId, TansiveError};
use tansive_crypto::KeyPair;
use tansive_events::{recv_lenient, Topic, DEFAULT_BUF_SIZE};
use tansive_session::{CreateSessionParams, ExecutionState, McpProxyRegistrar, Session, SessionResult, SkillRunner};

use crate::error::ApiError;
use crate::server_client::{self, ExecutionStatePayload};
use crate::state::AppState;

/// Build the `/sessions*` router.
#[must_use]
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", delete(delete_session))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SessionType {
    Interactive,
    McpProxy,
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    session_type: SessionType,
    code: String,
    code_verifier: String,
}

/// `POST /sessions` (§4.11): redeem the session's PKCE code, fetch its
/// `ExecutionState`, construct the [`Session`], and either stream its run
/// as NDJSON (`interactive`) or register an MCP proxy and return its URL
/// (`mcp_proxy`).
async fn create_session(State(state): State<AppState>, Json(body): Json<CreateSessionRequest>) -> Result<Response, ApiError> {
    let (session_token, exec_state) = server_client::redeem_and_fetch_state(&state.http, &state.config.server_url, &body.code, &body.code_verifier).await?;

    let session_id = exec_state.session_id;
    state.local_catalog.insert_view(exec_state.view.clone());
    state.local_catalog.create_session(SessionRecord::new(session_id, exec_state.tenant_id.clone(), "tangent", exec_state.scope.catalog.clone(), exec_state.view.id)).await?;

    let session = build_session(&state, session_id, &exec_state)?;
    session.fetch_objects().await?;

    match body.session_type {
        SessionType::Interactive => Ok(stream_interactive_run(state, session, session_token, exec_state).await),
        SessionType::McpProxy => {
            let url = session.run_mcp_proxy(None).await?;
            let mut response = StatusCode::CREATED.into_response();
            response.headers_mut().insert(
                "location",
                HeaderValue::from_str(&url).map_err(|_| ApiError(TansiveError::ServerError("invalid proxy url".into())))?,
            );
            Ok(response)
        }
    }
}

fn build_session(state: &AppState, session_id: SessionId, exec_state: &ExecutionStatePayload) -> Result<Arc<Session>, ApiError> {
    let audit_log_path = state.config.audit_dir.join(format!("{session_id}.log"));
    let params = CreateSessionParams {
        session_id,
        execution_state: ExecutionState {
            skillset_name: exec_state.skillset_name.clone(),
            skill_name: exec_state.skill_name.clone(),
            view: exec_state.view.clone(),
            session_variables: exec_state.session_variables.clone(),
            input_args: exec_state.input_args.clone(),
            scope: exec_state.scope.clone(),
            tenant_id: exec_state.tenant_id.clone(),
        },
        audit_log_path,
        signing_key: KeyPair::generate(),
        flush_interval: state.config.flush_interval,
        compress_threshold: state.config.compress_threshold,
        max_call_depth: state.config.max_call_depth as usize,
        runner: Arc::clone(&state.runner) as Arc<dyn SkillRunner>,
        mcp_registrar: Arc::clone(&state.mcp_proxies) as Arc<dyn McpProxyRegistrar>,
        catalog: state.catalog(),
        events: Arc::clone(&state.events),
    };
    Ok(state.sessions.create_session(params)?)
}

/// Subscribe to the session's interactive-log topic, launch `Run` in the
/// background, and stream every published event as an NDJSON line until
/// `Run` returns, then finalize and report the terminal status to the
/// Server (§4.11).
async fn stream_interactive_run(state: AppState, session: Arc<Session>, session_token: String, exec_state: ExecutionStatePayload) -> Response {
    let session_id = session.session_id;
    let mut rx = state.events.subscribe(&Topic::interactive_log(session_id), DEFAULT_BUF_SIZE);

    let run_session = Arc::clone(&session);
    let skill_name = exec_state.skill_name.clone();
    let input_args = exec_state.input_args.clone();
    let mut run_handle = tokio::spawn(async move {
        let invocation_id = InvocationId::new();
        run_session.run(None, &skill_name, input_args, invocation_id).await
    });

    let body_stream = stream! {
        loop {
            tokio::select! {
                event = recv_lenient(&mut rx) => {
                    match event {
                        Some(event) => {
                            if let Ok(line) = event.to_ndjson_line() {
                                yield Ok::<_, std::convert::Infallible>(format!("{line}\n"));
                            }
                        }
                        None => break,
                    }
                }
                result = &mut run_handle => {
                    while let Ok(event) = rx.try_recv() {
                        if let Ok(line) = event.to_ndjson_line() {
                            yield Ok::<_, std::convert::Infallible>(format!("{line}\n"));
                        }
                    }
                    finalize_and_report(&state, &session, &session_token, result).await;
                    break;
                }
            }
        }
    };

    let mut response = axum::body::Body::from_stream(body_stream).into_response();
    response.headers_mut().insert("content-type", HeaderValue::from_static("application/x-ndjson"));
    response
}

async fn finalize_and_report(
    state: &AppState,
    session: &Arc<Session>,
    session_token: &str,
    run_result: Result<SessionResult<serde_json::Value>, tokio::task::JoinError>,
) {
    let (summary, error) = match run_result {
        Ok(Ok(_)) => (SessionSummary::Completed, None),
        Ok(Err(err)) => (SessionSummary::Failed, Some(err.to_string())),
        Err(join_err) => (SessionSummary::Failed, Some(format!("run task did not complete: {join_err}"))),
    };

    if let Err(err) = session.finalize(summary, error).await {
        tracing::warn!(session = %session.session_id, error = %err, "failed to finalize session");
    }
    state.sessions.remove(session.session_id);
    state.mcp_proxies.revoke_session(session.session_id).await;

    report_terminal_status(state, session.session_id, session_token).await;
}

/// Forward a session's locally-recorded terminal status and packaged audit
/// log back to the Server (§4.6 `Finalize`, §4.11).
async fn report_terminal_status(state: &AppState, session_id: SessionId, session_token: &str) {
    let record = match state.local_catalog.get_session(session_id).await {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(%session_id, error = %err, "no local session record to report");
            return;
        }
    };
    let audit_log = state.local_catalog.load_audit_blob(session_id).await.ok();

    if let Err(err) = server_client::report_status(&state.http, &state.config.server_url, session_token, record.summary, record.status, audit_log).await {
        tracing::warn!(%session_id, error = %err, "failed to report final status to server");
    }
}

#[derive(Deserialize)]
struct DeleteSessionQuery {
    code: String,
    code_verifier: String,
}

/// `DELETE /sessions/{id}?code=&code_verifier=` (§4.11): redeem the stop
/// handshake code, stop the session, and report `Stopped` to the Server.
async fn delete_session(State(state): State<AppState>, Path(id): Path<SessionId>, Query(q): Query<DeleteSessionQuery>) -> Result<(), ApiError> {
    let (session_token, _exec_state) = server_client::redeem_and_fetch_state(&state.http, &state.config.server_url, &q.code, &q.code_verifier).await?;

    let session = state.sessions.get(id).ok_or_else(|| ApiError(TansiveError::NotFound(format!("session not found: {id}"))))?;
    session.stop("stopped by request").await?;

    state.sessions.remove(id);
    state.mcp_proxies.revoke_session(id).await;
    report_terminal_status(&state, id, &session_token).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use tansive_catalog::{ContextSlot, Dependency, InMemoryCatalog, RunnerKind, SkillDef, Source};
    use tansive_config::Config;
    use tansive_core::ViewId;
    use tansive_policy::{Action, Rule, Scope, View};
    use tansive_runner::McpProxyRegistry;
    use tansive_session::{ActiveSessionManager, RunnerContext, DEFAULT_MAX_CALL_DEPTH};

    use super::*;

    #[test]
    fn session_type_parses_snake_case() {
        let body: CreateSessionRequest = serde_json::from_value(serde_json::json!({
            "session_type": "mcp_proxy",
            "code": "c",
            "code_verifier": "v",
        }))
        .unwrap();
        assert_eq!(body.session_type, SessionType::McpProxy);
    }

    struct EchoRunner;

    #[async_trait]
    impl SkillRunner for EchoRunner {
        async fn run(&self, ctx: RunnerContext<'_>) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({"ran": ctx.skill.name}))
        }
    }

    struct StubRegistrar;

    #[async_trait]
    impl McpProxyRegistrar for StubRegistrar {
        async fn register(&self, session_id: SessionId, _invoker_view: View, _invoker_id: Option<InvocationId>) -> Result<String, String> {
            Ok(format!("/session/{session_id}/mcp"))
        }
    }

    fn allow_all_view() -> View {
        View::new(
            ViewId::new(),
            "root",
            "tenant-1",
            Scope { catalog: "default".into(), variant: None, namespace: None },
            vec![Rule::allow(vec![Action::new("system.skillset.use").unwrap()], vec![tansive_policy::ResourceUri::parse("res://skillsets/*").unwrap()])],
        )
    }

    /// §8 S4: an interactive run's NDJSON body carries at least one
    /// `skill_start` and one `skill_end` line, each independently valid
    /// JSON.
    #[tokio::test]
    async fn interactive_run_streams_skill_start_and_skill_end_as_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert_skillset(tansive_catalog::SkillSet {
            name: "demo".into(),
            version: "1.0.0".into(),
            sources: vec![Source { name: "k8s".into(), runner: RunnerKind::Stdio, config: serde_json::json!({}) }],
            context: vec![ContextSlot { name: "region".into(), schema: serde_json::json!({}), value: serde_json::json!("us-east-1") }],
            skills: vec![SkillDef {
                name: "restart".into(),
                source: "k8s".into(),
                input_schema: serde_json::json!({}),
                output_schema: serde_json::json!({}),
                exported_actions: vec![Action::new("system.skillset.use").unwrap()],
                annotations: Default::default(),
                transform: None,
            }],
            dependencies: vec![Dependency { resource_uri: "res://resources/x".into() }],
        });

        let view = allow_all_view();
        let session_id = SessionId::new();
        catalog
            .create_session(SessionRecord::new(session_id, "tenant-1", "tangent", "default", view.id))
            .await
            .unwrap();

        let manager = Arc::new(ActiveSessionManager::new());
        let events = Arc::new(tansive_events::EventBus::new());
        let exec_state = ExecutionStatePayload {
            session_id,
            skillset_name: "demo".into(),
            skill_name: "restart".into(),
            view,
            session_variables: serde_json::json!({}),
            input_args: serde_json::json!({}),
            scope: Scope { catalog: "default".into(), variant: None, namespace: None },
            tenant_id: "tenant-1".into(),
        };

        let session = manager
            .create_session(CreateSessionParams {
                session_id,
                execution_state: ExecutionState {
                    skillset_name: exec_state.skillset_name.clone(),
                    skill_name: exec_state.skill_name.clone(),
                    view: exec_state.view.clone(),
                    session_variables: exec_state.session_variables.clone(),
                    input_args: exec_state.input_args.clone(),
                    scope: exec_state.scope.clone(),
                    tenant_id: exec_state.tenant_id.clone(),
                },
                audit_log_path: dir.path().join("session.tlog"),
                signing_key: KeyPair::generate(),
                flush_interval: 16,
                compress_threshold: 64 * 1024,
                max_call_depth: DEFAULT_MAX_CALL_DEPTH,
                runner: Arc::new(EchoRunner),
                mcp_registrar: Arc::new(StubRegistrar),
                catalog: Arc::clone(&catalog) as Arc<dyn CatalogStore>,
                events: Arc::clone(&events),
            })
            .unwrap();
        session.fetch_objects().await.unwrap();

        let state = AppState {
            sessions: Arc::clone(&manager),
            local_catalog: catalog,
            runner: Arc::new(crate::state::CompositeRunner::new(dir.path().join("scripts"), dir.path().join("homes"))),
            mcp_proxies: Arc::new(McpProxyRegistry::new()),
            events,
            http: reqwest::Client::new(),
            config: Config::default().runtime,
        };

        let response = stream_interactive_run(state, session, "unused-token".into(), exec_state).await;
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();

        let names: Vec<String> = body
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .map(|value| value["name"].as_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"skill_start".to_string()));
        assert!(names.contains(&"skill_end".to_string()));
    }
}
