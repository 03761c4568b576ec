//! Maps the shared [`TansiveError`] taxonomy onto HTTP responses, and folds
//! every crate-specific error this binary touches into it.
//!
//! `TansiveError` lives in `tansive-core`, which cannot depend on `axum`
//! (it sits below the HTTP boundary), so the `IntoResponse` impl lives here
//! on a thin wrapper instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tansive_core::TansiveError;

/// A [`TansiveError`] at the HTTP boundary.
pub struct ApiError(pub TansiveError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({"error": self.0.to_string(), "kind": self.0.kind()}));
        (status, body).into_response()
    }
}

impl From<TansiveError> for ApiError {
    fn from(err: TansiveError) -> Self {
        Self(err)
    }
}

impl From<tansive_catalog::CatalogError> for ApiError {
    fn from(err: tansive_catalog::CatalogError) -> Self {
        use tansive_catalog::CatalogError as E;
        let mapped = match &err {
            E::ViewNotFound(_) | E::SkillSetNotFound(_) | E::SessionNotFound(_) | E::AuditBlobNotFound(_) => {
                TansiveError::NotFound(err.to_string())
            }
            E::SessionAlreadyExists(_) => TansiveError::Conflict(err.to_string()),
        };
        Self(mapped)
    }
}

impl From<tansive_session::SessionError> for ApiError {
    fn from(err: tansive_session::SessionError) -> Self {
        use tansive_session::SessionError as E;
        let mapped = match &err {
            E::AlreadyExists(_) | E::AlreadyFinalized => TansiveError::Conflict(err.to_string()),
            E::NotFound(_) | E::SkillNotFound(_) | E::SourceNotFound(_) | E::UnknownInvoker(_) => TansiveError::NotFound(err.to_string()),
            E::ParentNotFound(_) | E::LoopDetected(_) | E::DepthLimitExceeded | E::InvocationIdReused(_) => {
                TansiveError::ToolGraph(err.to_string())
            }
            E::BlockedByPolicy(_) => TansiveError::BlockedByPolicy(err.to_string()),
            E::TransformUndefined(_) | E::TransformInvalidResult => TansiveError::TransformUndefined(err.to_string()),
            E::ExecutionFailed(_) => TansiveError::ExecutionFailed(err.to_string()),
            E::PkceFailed(_) => TansiveError::Unauthorized(err.to_string()),
            E::Audit(_) | E::Catalog(_) | E::Crypto(_) => TansiveError::ServerError(err.to_string()),
        };
        Self(mapped)
    }
}

impl From<tansive_token::TokenError> for ApiError {
    fn from(err: tansive_token::TokenError) -> Self {
        Self(TansiveError::Unauthorized(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn not_found_catalog_error_maps_to_404() {
        let api: ApiError = tansive_catalog::CatalogError::ViewNotFound("x".into()).into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn loop_detected_maps_to_400_tool_graph() {
        let api: ApiError = tansive_session::SessionError::LoopDetected("echo".into()).into();
        assert_eq!(api.0.kind(), "ToolGraph");
    }

    #[test]
    fn pkce_failure_maps_to_401() {
        let api: ApiError = tansive_session::SessionError::PkceFailed("bad verifier".into()).into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
