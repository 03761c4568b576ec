//! Audit logging error types.

use thiserror::Error;

/// Errors that can occur while writing, verifying, or packaging audit logs.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The writer has already recorded a write failure and refuses further entries.
    #[error("audit log writer is in a failed state")]
    WriterFailed,

    /// `Close` or `AddEntry` was called after the writer was already closed.
    #[error("audit log writer is already closed")]
    AlreadyClosed,

    /// An entry's `prev_hash` does not match the previous entry's `hash`.
    #[error("chain broken at line {line}: {reason}")]
    ChainBroken {
        /// 1-indexed line number of the offending entry.
        line: usize,
        /// What failed to match.
        reason: String,
    },

    /// An entry's signature does not verify against the session's public key.
    #[error("invalid signature at line {line}")]
    InvalidSignature {
        /// 1-indexed line number of the offending entry.
        line: usize,
    },

    /// Underlying I/O failure (opening, writing, or reading the log file).
    #[error("audit log I/O error: {0}")]
    Io(String),

    /// JSON (de)serialization failure.
    #[error("audit log serialization error: {0}")]
    Serialization(String),

    /// Base64 decoding failure while decoding a transported log payload.
    #[error("invalid base64 audit log payload: {0}")]
    InvalidBase64(String),

    /// Cryptographic failure (signing/verification key handling).
    #[error("crypto error: {0}")]
    Crypto(#[from] tansive_crypto::CryptoError),
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for audit log operations.
pub type AuditResult<T> = Result<T, AuditError>;
