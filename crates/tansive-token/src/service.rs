//! The token service (C4): a per-process Ed25519 signing key plus
//! revocation tracking.

use std::collections::HashSet;
use std::sync::RwLock;

use tansive_crypto::{KeyPair, PublicKey};
use uuid::Uuid;

use crate::claims::{Claims, TokenUse, AUDIENCE, TOKEN_VERSION};
use crate::error::{TokenError, TokenResult};
use crate::jws::Token;
use crate::jwks::JwksDocument;

/// Maximum lifetime of a minted token, in seconds.
pub const MAX_TOKEN_AGE_SECS: i64 = 3600;

/// Clock-skew tolerance applied to `exp`/`nbf` checks, in seconds.
pub const CLOCK_SKEW_SECS: i64 = 30;

/// Mints and validates tokens for one issuer (`<host>:<port>`).
pub struct TokenService {
    signing_key: KeyPair,
    issuer: String,
    revoked: RwLock<HashSet<Uuid>>,
}

impl TokenService {
    /// Build a token service around an already-loaded signing key.
    #[must_use]
    pub fn new(signing_key: KeyPair, issuer: impl Into<String>) -> Self {
        Self {
            signing_key,
            issuer: issuer.into(),
            revoked: RwLock::new(HashSet::new()),
        }
    }

    /// The current signing key's public half, for JWKS publication.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.signing_key.export_public_key()
    }

    /// Build the JWKS document for `GET /.well-known/jwks.json`.
    #[must_use]
    pub fn jwks(&self) -> JwksDocument {
        JwksDocument::single(&self.public_key())
    }

    /// Mint a view-scoped access token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] only if claim serialization fails,
    /// which does not happen for well-formed inputs.
    pub fn mint_access_token(&self, view_id: Uuid, tenant_id: &str, sub: String, max_age_secs: i64) -> TokenResult<Token> {
        let max_age = max_age_secs.min(MAX_TOKEN_AGE_SECS);
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            view_id: Some(view_id),
            tenant_id: tenant_id.to_string(),
            iss: self.issuer.clone(),
            aud: AUDIENCE.to_string(),
            jti: Uuid::new_v4(),
            iat: now,
            exp: now + max_age,
            ver: TOKEN_VERSION.to_string(),
            token_use: TokenUse::Access,
            sub,
        };
        Token::sign(&claims, &self.signing_key)
    }

    /// Mint a user or session identity token.
    ///
    /// # Errors
    ///
    /// See [`mint_access_token`](Self::mint_access_token).
    pub fn mint_identity_token(&self, tenant_id: &str, sub: String, max_age_secs: i64) -> TokenResult<Token> {
        let max_age = max_age_secs.min(MAX_TOKEN_AGE_SECS);
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            view_id: None,
            tenant_id: tenant_id.to_string(),
            iss: self.issuer.clone(),
            aud: AUDIENCE.to_string(),
            jti: Uuid::new_v4(),
            iat: now,
            exp: now + max_age,
            ver: TOKEN_VERSION.to_string(),
            token_use: TokenUse::Identity,
            sub,
        };
        Token::sign(&claims, &self.signing_key)
    }

    /// Revoke a token by its `jti`, so subsequent [`validate`](Self::validate)
    /// calls reject it.
    pub fn revoke(&self, jti: Uuid) {
        if let Ok(mut set) = self.revoked.write() {
            set.insert(jti);
        }
    }

    /// Whether `jti` has been revoked.
    #[must_use]
    pub fn is_revoked(&self, jti: Uuid) -> bool {
        self.revoked.read().map(|set| set.contains(&jti)).unwrap_or(true)
    }

    /// Validate signature, required claims, `ver`, clock skew, token age,
    /// issuer/audience, and revocation. Does not check view-tenant
    /// consistency — see [`check_view_tenant`].
    ///
    /// # Errors
    ///
    /// See [`TokenError`] variants.
    pub fn validate(&self, token: &str) -> TokenResult<Claims> {
        let claims = Token::from_compact(token).decode_and_verify(&self.public_key())?;

        if claims.ver != TOKEN_VERSION {
            return Err(TokenError::InvalidClaim("ver".into()));
        }
        if claims.aud != AUDIENCE || claims.iss != self.issuer {
            return Err(TokenError::IssuerAudienceMismatch);
        }

        let now = chrono::Utc::now().timestamp();
        if claims.exp + CLOCK_SKEW_SECS < now {
            return Err(TokenError::Expired);
        }
        if claims.iat - CLOCK_SKEW_SECS > now {
            return Err(TokenError::Expired);
        }
        if now - claims.iat > MAX_TOKEN_AGE_SECS + CLOCK_SKEW_SECS {
            return Err(TokenError::TooOld);
        }

        if self.is_revoked(claims.jti) {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }
}

/// Check that an access token's claimed tenant matches the tenant owning
/// the view it references (§4.4, §8 scenario S5).
///
/// # Errors
///
/// Returns [`TokenError::ViewTenantMismatch`] on mismatch.
pub fn check_view_tenant(claims: &Claims, view_tenant_id: &str) -> TokenResult<()> {
    if claims.tenant_id != view_tenant_id {
        return Err(TokenError::ViewTenantMismatch);
    }
    Ok(())
}
