//! Token service errors.

use thiserror::Error;

/// Errors minting or validating a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token's signature did not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// The compact serialization was malformed (wrong segment count, bad
    /// base64url, undecodable JSON).
    #[error("malformed token: {0}")]
    Malformed(String),

    /// A required claim was missing, or `ver` did not match.
    #[error("missing or invalid claim: {0}")]
    InvalidClaim(String),

    /// `exp` is in the past (beyond clock-skew allowance) or `nbf` is in
    /// the future.
    #[error("token expired or not yet valid")]
    Expired,

    /// `iat` is older than `MaxTokenAge`.
    #[error("token too old")]
    TooOld,

    /// `iss`/`aud` did not match the expected values.
    #[error("issuer or audience mismatch")]
    IssuerAudienceMismatch,

    /// The token's `jti` is in the revocation set.
    #[error("token revoked")]
    Revoked,

    /// The view referenced by an access token has a different `tenant_id`
    /// than the token claims.
    #[error("view tenant mismatch")]
    ViewTenantMismatch,
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;
