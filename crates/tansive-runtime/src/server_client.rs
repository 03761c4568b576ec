//! The Runtime's outbound HTTP client to the Server: PKCE redemption,
//! execution-state fetch, and status/audit-log reporting (§4.5, §4.11).
//!
//! Grounded in the teacher's `astrid-llm` HTTP-client shape (`reqwest`
//! with a shared `Client`, JSON in/out, error mapped at the call site).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tansive_catalog::{SessionStatusDetail, SessionSummary};
use tansive_core::SessionId;
use tansive_policy::{Scope, View};

use crate::error::ApiError;

/// What `GET /sessions/execution-state` on the Server returns (mirrors
/// `tansive_server`'s private `ExecutionStateResponse`, duplicated here
/// since the two binaries share no API crate).
#[derive(Clone, Debug, Deserialize)]
pub struct ExecutionStatePayload {
    /// The session this execution state belongs to.
    pub session_id: SessionId,
    /// The skillset this session runs against.
    pub skillset_name: String,
    /// The session's entry skill.
    pub skill_name: String,
    /// The view the session's root invocations are bound to.
    pub view: View,
    /// Session-scoped variables.
    #[serde(default)]
    pub session_variables: Value,
    /// The entry skill's input arguments.
    #[serde(default)]
    pub input_args: Value,
    /// The scope this session runs within.
    pub scope: Scope,
    /// The owning tenant.
    pub tenant_id: String,
}

#[derive(Deserialize)]
struct RedeemResponse {
    token: String,
}

#[derive(Serialize)]
struct PatchStatusBody {
    summary: SessionSummary,
    #[serde(flatten)]
    detail: SessionStatusDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    audit_log: Option<String>,
}

/// Redeem a PKCE `code`/`code_verifier` pair against the Server, then use
/// the resulting session-scoped access token to fetch the session's
/// `ExecutionState` (§4.5 steps 4-6).
///
/// # Errors
///
/// Returns [`ApiError`] if either call fails at the transport level or the
/// Server rejects the redemption (expired/consumed code, bad verifier).
pub async fn redeem_and_fetch_state(
    client: &reqwest::Client,
    server_url: &str,
    code: &str,
    code_verifier: &str,
) -> Result<(String, ExecutionStatePayload), ApiError> {
    let redeem_url = format!("{server_url}/sessions/execution-state?code={code}&code_verifier={code_verifier}");
    let response = client.post(&redeem_url).send().await?;
    let response = error_for_status(response).await?;
    let redeemed: RedeemResponse = response.json().await?;

    let fetch_url = format!("{server_url}/sessions/execution-state");
    let response = client.get(&fetch_url).bearer_auth(&redeemed.token).send().await?;
    let response = error_for_status(response).await?;
    let state: ExecutionStatePayload = response.json().await?;

    Ok((redeemed.token, state))
}

/// Report a session's terminal status (and, for a finalize, its packaged
/// audit log) back to the Server (§4.6 `Finalize`, §4.11).
///
/// # Errors
///
/// Returns [`ApiError`] if the PATCH fails at the transport level or the
/// Server rejects the session token.
pub async fn report_status(
    client: &reqwest::Client,
    server_url: &str,
    session_token: &str,
    summary: SessionSummary,
    detail: SessionStatusDetail,
    audit_log: Option<String>,
) -> Result<(), ApiError> {
    let url = format!("{server_url}/sessions/execution-state");
    let response = client
        .patch(&url)
        .bearer_auth(session_token)
        .json(&PatchStatusBody { summary, detail, audit_log })
        .send()
        .await?;
    error_for_status(response).await?;
    Ok(())
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ApiError(tansive_core::TansiveError::ServerError(format!("server returned {status}: {body}"))))
}
