//! `/sessions*` handlers (C5, C6, C11 server side): session creation, PKCE
//! redemption, execution-state exchange, listing/describing, stop, and
//! audit-log retrieval.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tansive_catalog::{SessionRecord, SessionStatusDetail, SessionSummary};
use tansive_core::{SessionId, TansiveError, Timestamp, ViewId};
use tansive_policy::Scope;
use tansive_session::{AuthCodeGrant, ExecutionState};
use tansive_token::{check_view_tenant, Claims};

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/sessions*` router.
#[must_use]
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_or_get_sessions))
        .route("/sessions/execution-state", post(redeem_execution_state).get(get_execution_state).patch(patch_execution_state))
        .route("/sessions/:id", delete(stop_session))
        .route("/sessions/:id/auditlog", get(get_audit_log))
        .route("/sessions/:id/auditlog/verification-key", get(get_verification_key))
}

fn session_id_from_sub(sub: &str) -> Result<SessionId, ApiError> {
    sub.strip_prefix("session/")
        .and_then(|raw| raw.parse::<uuid::Uuid>().ok())
        .map(SessionId::from_uuid)
        .ok_or_else(|| ApiError(TansiveError::Unauthorized("token is not session-scoped".into())))
}

#[derive(Deserialize)]
struct CreateSessionQuery {
    #[serde(default)]
    interactive: bool,
    code_challenge: String,
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    skillset_name: String,
    skill_name: String,
    #[serde(default)]
    session_variables: Value,
    #[serde(default)]
    input_args: Value,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    code: String,
    #[serde(rename = "tangentURL")]
    tangent_url: String,
}

/// `POST /sessions?interactive=&code_challenge=` (§4.5 steps 1-3): create
/// the session record, stash its `ExecutionState`, and mint a PKCE code.
///
/// `interactive` only affects which surface the Runtime streams the run
/// over once the session starts (§4.11) — it is not interpreted here.
async fn create_session(
    State(state): State<AppState>,
    Query(q): Query<CreateSessionQuery>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let _ = q.interactive;
    let claims = authenticate(&state, &headers)?;
    let Some(view_id) = claims.view_id else {
        return Err(ApiError(TansiveError::Unauthorized("session creation requires a view-scoped access token".into())));
    };

    let view = state.catalog.get_view(ViewId::from_uuid(view_id)).await?;
    check_view_tenant(&claims, &view.tenant_id).map_err(ApiError::from)?;

    let session_id = SessionId::new();
    state.catalog.create_session(SessionRecord::new(session_id, claims.tenant_id.clone(), claims.sub.clone(), view.scope.catalog.clone(), view.id)).await?;

    state.put_execution_state(
        session_id,
        ExecutionState {
            skillset_name: body.skillset_name,
            skill_name: body.skill_name,
            view: view.clone(),
            session_variables: body.session_variables,
            input_args: body.input_args,
            scope: view.scope.clone(),
            tenant_id: claims.tenant_id.clone(),
        },
    );

    let code = state.auth_codes.issue(AuthCodeGrant {
        code_challenge: q.code_challenge,
        session_id,
        tenant_id: claims.tenant_id,
        catalog_id: view.scope.catalog.clone(),
        view_id: view.id,
        issued_at: Timestamp::now(),
        ttl_secs: state.config.auth_code_ttl_secs,
    });

    Ok(Json(CreateSessionResponse { code, tangent_url: state.tangent_url.clone() }))
}

#[derive(Deserialize)]
struct RedeemQuery {
    code: String,
    code_verifier: String,
}

#[derive(Serialize)]
struct RedeemResponse {
    token: String,
    expiry: i64,
}

/// `POST /sessions/execution-state?code=&code_verifier=` (§4.5 steps 4-5):
/// redeem a single-use PKCE code for a session-scoped access token.
async fn redeem_execution_state(State(state): State<AppState>, Query(q): Query<RedeemQuery>) -> Result<Json<RedeemResponse>, ApiError> {
    let grant = state.auth_codes.redeem(&q.code, &q.code_verifier, Timestamp::now()).map_err(ApiError::from)?;

    let token = state
        .tokens
        .mint_access_token(grant.view_id.as_uuid(), &grant.tenant_id, Claims::subject_for_session(grant.session_id.as_uuid()), state.config.max_token_age_secs)
        .map_err(ApiError::from)?;
    let claims = token.decode_and_verify(&state.tokens.public_key()).map_err(|e| ApiError(TansiveError::ServerError(e.to_string())))?;
    Ok(Json(RedeemResponse { token: token.as_str().to_string(), expiry: claims.exp }))
}

/// `GET /sessions/execution-state` (§4.5 step 6, access-token-authenticated):
/// hand the Runtime the `ExecutionState` it needs to construct a `Session`.
async fn get_execution_state(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<ExecutionStateResponse>, ApiError> {
    let claims = authenticate(&state, &headers)?;
    let session_id = session_id_from_sub(&claims.sub)?;
    let execution_state = state
        .get_execution_state(session_id)
        .ok_or_else(|| ApiError(TansiveError::NotFound(format!("no execution state for session {session_id}"))))?;
    check_view_tenant(&claims, &execution_state.tenant_id).map_err(ApiError::from)?;

    Ok(Json(ExecutionStateResponse {
        session_id,
        skillset_name: execution_state.skillset_name,
        skill_name: execution_state.skill_name,
        view: execution_state.view,
        session_variables: execution_state.session_variables,
        input_args: execution_state.input_args,
        scope: execution_state.scope,
        tenant_id: execution_state.tenant_id,
    }))
}

#[derive(Serialize)]
struct ExecutionStateResponse {
    session_id: SessionId,
    skillset_name: String,
    skill_name: String,
    view: tansive_policy::View,
    session_variables: Value,
    input_args: Value,
    scope: Scope,
    tenant_id: String,
}

#[derive(Deserialize)]
struct PatchExecutionStateRequest {
    summary: SessionSummary,
    #[serde(flatten)]
    detail: SessionStatusDetail,
    /// Base64-encoded, already-packaged audit log (§4.12), uploaded once
    /// the session finalizes.
    #[serde(default)]
    audit_log: Option<String>,
}

/// `PATCH /sessions/execution-state` (§4.11/§4.6 `Finalize`): the Runtime
/// reports a status transition, optionally uploading the finalized,
/// packaged audit log alongside it.
async fn patch_execution_state(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<PatchExecutionStateRequest>) -> Result<(), ApiError> {
    let claims = authenticate(&state, &headers)?;
    let session_id = session_id_from_sub(&claims.sub)?;

    if let Some(b64) = body.audit_log {
        state.catalog.store_audit_blob(session_id, b64).await?;
    }
    state.catalog.update_session_status(session_id, body.summary, body.detail).await?;
    Ok(())
}

#[derive(Deserialize)]
struct ListSessionsQuery {
    #[serde(rename = "sessionID", default)]
    session_id: Option<SessionId>,
}

/// `GET /sessions` and `GET /sessions?sessionID=`: list every session, or
/// describe one.
async fn list_or_get_sessions(State(state): State<AppState>, Query(q): Query<ListSessionsQuery>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    authenticate(&state, &headers)?;

    if let Some(id) = q.session_id {
        let record = state.catalog.get_session(id).await?;
        return Ok(Json(serde_json::to_value(record).unwrap()));
    }
    let records = state.catalog.list_sessions().await?;
    Ok(Json(serde_json::to_value(records).unwrap()))
}

#[derive(Deserialize)]
struct StopQuery {
    code_challenge: String,
}

/// `DELETE /sessions/{id}?code_challenge=` (§4.11): stop handshake mirroring
/// create — mints a fresh PKCE code the Runtime redeems to authorize the
/// `Stop` call.
async fn stop_session(State(state): State<AppState>, Path(id): Path<SessionId>, Query(q): Query<StopQuery>, headers: HeaderMap) -> Result<Json<CreateSessionResponse>, ApiError> {
    let claims = authenticate(&state, &headers)?;
    let record = state.catalog.get_session(id).await?;
    if record.tenant_id != claims.tenant_id {
        return Err(ApiError(TansiveError::NotFound(format!("session not found: {id}"))));
    }

    let code = state.auth_codes.issue(AuthCodeGrant {
        code_challenge: q.code_challenge,
        session_id: id,
        tenant_id: record.tenant_id,
        catalog_id: record.catalog,
        view_id: record.view_id,
        issued_at: Timestamp::now(),
        ttl_secs: state.config.auth_code_ttl_secs,
    });

    Ok(Json(CreateSessionResponse { code, tangent_url: state.tangent_url.clone() }))
}

#[derive(Serialize)]
struct AuditLogResponse {
    audit_log: String,
}

/// `GET /sessions/{id}/auditlog`: the finalized, packaged (possibly
/// Snappy-framed), base64-encoded audit log (§4.12).
async fn get_audit_log(State(state): State<AppState>, Path(id): Path<SessionId>, headers: HeaderMap) -> Result<Json<AuditLogResponse>, ApiError> {
    authenticate(&state, &headers)?;
    let audit_log = state.catalog.load_audit_blob(id).await?;
    Ok(Json(AuditLogResponse { audit_log }))
}

#[derive(Serialize)]
struct VerificationKeyResponse {
    key: String,
}

/// `GET /sessions/{id}/auditlog/verification-key`: the session log's
/// Ed25519 public key, base64url-encoded (§3 "Session").
async fn get_verification_key(State(state): State<AppState>, Path(id): Path<SessionId>, headers: HeaderMap) -> Result<Json<VerificationKeyResponse>, ApiError> {
    authenticate(&state, &headers)?;
    let record = state.catalog.get_session(id).await?;
    let key = record
        .status
        .verification_key
        .ok_or_else(|| ApiError(TansiveError::NotFound(format!("no verification key recorded yet for session {id}"))))?;
    Ok(Json(VerificationKeyResponse { key }))
}
