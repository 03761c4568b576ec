//! Catalog store error types.

use thiserror::Error;

/// Errors reading or writing the catalog object store.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No view with this id or label exists.
    #[error("view not found: {0}")]
    ViewNotFound(String),

    /// No skillset with this name (and version, if given) exists.
    #[error("skillset not found: {0}")]
    SkillSetNotFound(String),

    /// No session with this id exists.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session with this id already exists (§3 "Lifecycle").
    #[error("session already exists: {0}")]
    SessionAlreadyExists(String),

    /// No audit blob has been stored for this session.
    #[error("audit blob not found for session: {0}")]
    AuditBlobNotFound(String),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
