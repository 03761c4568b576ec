//! Token claims (§4.4).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `token_use` claim value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    /// A view-scoped access token, used to fetch `ExecutionState`.
    Access,
    /// A user- or session-identity token.
    Identity,
}

/// The protocol version stamped into every token's `ver` claim.
pub const TOKEN_VERSION: &str = "0.1";

/// `"tansivesrv"` — the fixed audience every token targets.
pub const AUDIENCE: &str = "tansivesrv";

/// JWS claims, per the table in §4.4.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The view this access token is scoped to. Absent for identity tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_id: Option<Uuid>,
    /// The tenant this token belongs to.
    pub tenant_id: String,
    /// `<host>:<port>` of the issuing Server.
    pub iss: String,
    /// Always [`AUDIENCE`].
    pub aud: String,
    /// A random, per-token id, checked against the revocation set.
    pub jti: Uuid,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds. `exp - iat <= MaxTokenAge`.
    pub exp: i64,
    /// Protocol version, currently [`TOKEN_VERSION`].
    pub ver: String,
    /// Access or identity.
    pub token_use: TokenUse,
    /// `user/<id>` or `session/<uuid>`.
    pub sub: String,
}

impl Claims {
    /// Build the `sub` claim for a user identity.
    #[must_use]
    pub fn subject_for_user(user_id: &str) -> String {
        format!("user/{user_id}")
    }

    /// Build the `sub` claim for a session.
    #[must_use]
    pub fn subject_for_session(session_id: Uuid) -> String {
        format!("session/{session_id}")
    }
}
