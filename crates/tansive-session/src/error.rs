//! Errors raised by the session execution core (C2, C5, C6, C7).

use thiserror::Error;

/// Errors the session layer can raise, outside the narrower
/// [`tansive_core::TansiveError`] taxonomy used at HTTP boundaries.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A session with this id already exists (§4.6).
    #[error("session already exists: {0}")]
    AlreadyExists(String),

    /// No session with this id is active.
    #[error("session not found: {0}")]
    NotFound(String),

    /// `RegisterCall` with an unknown `parent_id` (§4.2).
    #[error("parent not found: {0}")]
    ParentNotFound(String),

    /// `tool_name` appears on the path from root to `parent_id` (§4.2).
    #[error("loop detected: {0} already on call path")]
    LoopDetected(String),

    /// The new call would exceed the session's configured call-depth limit.
    #[error("call depth limit exceeded")]
    DepthLimitExceeded,

    /// An `invocation_id` that names an existing node was reused (§4.6
    /// "Invocation-ID contract").
    #[error("invocation id already in use: {0}")]
    InvocationIdReused(String),

    /// The skillset's entry skill (or a referenced skill) does not exist.
    #[error("skill not found: {0}")]
    SkillNotFound(String),

    /// The skill's source does not exist in the skillset.
    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// Policy evaluation denied the action (§4.3).
    #[error("blocked by policy: {0}")]
    BlockedByPolicy(String),

    /// The invoker id does not correspond to a known invocation (its bound
    /// view cannot be resolved).
    #[error("unknown invoker: {0}")]
    UnknownInvoker(String),

    /// A named transform is missing, or threw during evaluation (§4.7).
    #[error("transform undefined: {0}")]
    TransformUndefined(String),

    /// The transform did not return a JSON object.
    #[error("transform returned a non-object value")]
    TransformInvalidResult,

    /// The dispatched child process or MCP call failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// PKCE `code_verifier` does not hash to the stored `code_challenge`,
    /// or the code is unknown/already consumed/expired (§4.5).
    #[error("pkce verification failed: {0}")]
    PkceFailed(String),

    /// The session has already been finalized; no further `Run`/`Stop`
    /// calls are accepted.
    #[error("session already finalized")]
    AlreadyFinalized,

    /// Audit log failure surfaced from [`tansive_audit`].
    #[error("audit error: {0}")]
    Audit(#[from] tansive_audit::AuditError),

    /// Catalog store failure surfaced from [`tansive_catalog`].
    #[error("catalog error: {0}")]
    Catalog(#[from] tansive_catalog::CatalogError),

    /// Cryptographic failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] tansive_crypto::CryptoError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
