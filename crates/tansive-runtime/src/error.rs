//! Maps [`TansiveError`] onto HTTP responses for the Runtime's own surface,
//! and folds every crate-specific error this binary touches into it.
//!
//! Mirrors `tansive-server`'s `ApiError` — the two binaries don't share a
//! crate for this because each only depends on the error taxonomies its own
//! handlers actually touch.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tansive_core::TansiveError;

/// A [`TansiveError`] at the Runtime's HTTP boundary.
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

/// A call to the Server (PKCE redemption, execution-state fetch, status
/// PATCH) failed at the transport or protocol level.
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self(TansiveError::ServerError(format!("server request failed: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn blocked_by_policy_maps_to_403() {
        let api: ApiError = tansive_session::SessionError::BlockedByPolicy("denied".into()).into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unknown_invoker_maps_to_404() {
        let api: ApiError = tansive_session::SessionError::UnknownInvoker("x".into()).into();
        assert_eq!(api.0.kind(), "NotFound");
    }
}
