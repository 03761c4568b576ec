//! `/auth/*` handlers (C4, C5): login, default-view adoption, and
//! view-to-view adoption.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tansive_core::{TansiveError, ViewId};
use tansive_policy::can_adopt_view;
use tansive_token::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/auth/*` router.
#[must_use]
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/default-view-adoptions/:catalog", post(default_view_adoption))
        .route("/auth/view-adoptions/:catalog/:view_label", post(view_adoption))
}

#[derive(Deserialize)]
struct LoginQuery {
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
    expiry: i64,
}

fn token_response(tokens: &tansive_token::TokenService, token: tansive_token::Token) -> Result<Json<Value>, ApiError> {
    let claims = token
        .decode_and_verify(&tokens.public_key())
        .map_err(|e| ApiError(TansiveError::ServerError(e.to_string())))?;
    Ok(Json(serde_json::to_value(TokenResponse { token: token.as_str().to_string(), expiry: claims.exp }).unwrap()))
}

/// `POST /auth/login?password=` (§4.4): mint an identity token for the
/// single configured user.
///
/// Full multi-user directory management is out of scope (§1); this
/// authenticates against the one password hash the Server is configured
/// with.
async fn login(State(state): State<AppState>, axum::extract::Query(q): axum::extract::Query<LoginQuery>) -> Result<Json<Value>, ApiError> {
    let digest = hex::encode(Sha256::digest(q.password.as_bytes()));
    if !constant_time_eq(digest.as_bytes(), state.config.admin_password_sha256.as_bytes()) {
        return Err(ApiError(TansiveError::Unauthorized("invalid credentials".into())));
    }

    let token = state
        .tokens
        .mint_identity_token(&state.config.single_tenant_id, Claims::subject_for_user(&state.config.single_user_id), state.config.max_token_age_secs)
        .map_err(ApiError::from)?;
    token_response(&state.tokens, token)
}

/// `POST /auth/default-view-adoptions/{catalog}` (§4.4): adopt the
/// catalog's `default`-labelled view, minting a view-scoped access token.
async fn default_view_adoption(State(state): State<AppState>, Path(catalog): Path<String>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let claims = authenticate(&state, &headers)?;
    let view = state.catalog.get_view_by_label(&catalog, "default").await?;

    let token = state
        .tokens
        .mint_access_token(view.id.as_uuid(), &view.tenant_id, claims.sub, state.config.max_token_age_secs)
        .map_err(ApiError::from)?;
    token_response(&state.tokens, token)
}

/// `POST /auth/view-adoptions/{catalog}/{viewLabel}` (§4.4, §8 invariant 4):
/// adopt a named view, if and only if the caller's current view may adopt
/// it (subset entailment, §4.3 `can_adopt_view`).
async fn view_adoption(
    State(state): State<AppState>,
    Path((catalog, view_label)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let claims = authenticate(&state, &headers)?;
    let Some(current_view_id) = claims.view_id else {
        return Err(ApiError(TansiveError::Unauthorized("identity tokens cannot adopt views directly; adopt a default view first".into())));
    };

    let current_view = state.catalog.get_view(ViewId::from_uuid(current_view_id)).await?;
    let child_view = state.catalog.get_view_by_label(&catalog, &view_label).await?;

    if !can_adopt_view(&current_view, &child_view) {
        return Err(ApiError(TansiveError::BlockedByPolicy(format!("view {} may not adopt {view_label}", current_view.label))));
    }

    let token = state
        .tokens
        .mint_access_token(child_view.id.as_uuid(), &child_view.tenant_id, claims.sub, state.config.max_token_age_secs)
        .map_err(ApiError::from)?;
    token_response(&state.tokens, token)
}

/// Pull and validate the `Authorization: Bearer` token from `headers`.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping [`TansiveError::Unauthorized`] if the
/// header is missing or the token does not validate.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError(TansiveError::Unauthorized("missing bearer token".into())))?;
    state.tokens.validate(raw).map_err(ApiError::from)
}

/// A fixed-time byte-slice comparison, so login timing doesn't leak how
/// many leading hex digits of the password hash matched.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
