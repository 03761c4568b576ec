//! The execution core's error taxonomy.
//!
//! Every kind carries an HTTP-status hint ([`TansiveError::http_status`]) so
//! a single enum can sit at both the policy/session layer and the HTTP
//! handler boundary, mirroring how each `astrid-*`-style crate keeps one
//! `thiserror` enum per concern.

use thiserror::Error;

/// A core error, tagged with the taxonomy kind from the error-handling
/// design (missing body, policy deny, call-graph loop, and so on).
#[derive(Debug, Error)]
pub enum TansiveError {
    /// Malformed or incomplete request: missing body, bad JSON, missing
    /// `code_challenge`.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or invalid token; PKCE code redemption failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Policy evaluation denied the action, or view adoption was not
    /// permitted.
    #[error("blocked by policy: {0}")]
    BlockedByPolicy(String),

    /// Session, skill, view not found, or auth code already consumed.
    #[error("not found: {0}")]
    NotFound(String),

    /// A session with this id already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Call-graph loop, depth exceeded, or invalid/reused invocation id.
    #[error("call graph error: {0}")]
    ToolGraph(String),

    /// The referenced transform is missing or threw.
    #[error("transform undefined: {0}")]
    TransformUndefined(String),

    /// A spawned child exited non-zero, or a pipe failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Unexpected internal failure: storage, missing signing key, and so on.
    #[error("server error: {0}")]
    ServerError(String),
}

impl TansiveError {
    /// The HTTP status code a handler should surface for this error kind.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::BlockedByPolicy(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::ToolGraph(_) | Self::TransformUndefined(_) => 400,
            Self::ExecutionFailed(_) => 500,
            Self::ServerError(_) => 500,
        }
    }

    /// The taxonomy kind name, as used in `audit.error` payloads.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::Unauthorized(_) => "Unauthorized",
            Self::BlockedByPolicy(_) => "BlockedByPolicy",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::ToolGraph(_) => "ToolGraph",
            Self::TransformUndefined(_) => "TransformUndefined",
            Self::ExecutionFailed(_) => "ExecutionFailed",
            Self::ServerError(_) => "ServerError",
        }
    }
}

/// Result type for core operations.
pub type TansiveResult<T> = Result<T, TansiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_matches_taxonomy_table() {
        assert_eq!(TansiveError::InvalidRequest("x".into()).http_status(), 400);
        assert_eq!(TansiveError::Unauthorized("x".into()).http_status(), 401);
        assert_eq!(TansiveError::BlockedByPolicy("x".into()).http_status(), 403);
        assert_eq!(TansiveError::NotFound("x".into()).http_status(), 404);
        assert_eq!(TansiveError::Conflict("x".into()).http_status(), 409);
        assert_eq!(TansiveError::ToolGraph("x".into()).http_status(), 400);
        assert_eq!(TansiveError::ExecutionFailed("x".into()).http_status(), 500);
        assert_eq!(TansiveError::ServerError("x".into()).http_status(), 500);
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(TansiveError::Conflict("x".into()).kind(), "Conflict");
    }
}
