//! PKCE (C5, §4.5): moving a view-scoped grant from Server to Runtime
//! without the Runtime ever handling the user's token.
//!
//! This module holds the pieces both sides share — the verifier/challenge
//! pair and the single-use [`AuthCode`] store the Server consults when the
//! Runtime redeems a code. The broker's HTTP endpoints live in
//! `tansive-server`; this crate only owns the data structures and the
//! redemption check so both binaries agree on their semantics.

use std::collections::HashMap;
use std::sync::RwLock;

use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tansive_core::{SessionId, Timestamp, ViewId};

use crate::error::{SessionError, SessionResult};

/// Default auth-code lifetime, in seconds (§4.5: "ttl≈60s").
pub const DEFAULT_CODE_TTL_SECS: i64 = 60;

/// Generate a random PKCE `code_verifier`: raw bytes, base64url-encoded,
/// at least 128 bits of entropy (32 bytes here, matching `code` generation).
#[must_use]
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Derive the `code_challenge` from a `code_verifier`: raw (unpadded)
/// base64url of `SHA256(code_verifier)` (§4.5 step 4: "base64url raw").
#[must_use]
pub fn code_challenge_from_verifier(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Mint a fresh, random auth code (≥128 bits), base64url-encoded.
#[must_use]
pub fn generate_auth_code() -> String {
    generate_code_verifier()
}

/// The grant an auth code stands for, stored server-side between
/// `POST /sessions` and the Runtime's redemption call.
#[derive(Clone, Debug)]
pub struct AuthCodeGrant {
    /// The PKCE `code_challenge` the redeeming `code_verifier` must hash to.
    pub code_challenge: String,
    /// The session this code was minted for.
    pub session_id: SessionId,
    /// The owning tenant.
    pub tenant_id: String,
    /// The catalog the session runs in.
    pub catalog_id: String,
    /// The view the minted access token will be scoped to.
    pub view_id: ViewId,
    /// When this code was minted.
    pub issued_at: Timestamp,
    /// Seconds after `issued_at` the code remains redeemable.
    pub ttl_secs: i64,
}

impl AuthCodeGrant {
    /// Whether this grant has outlived its TTL as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        (now.as_datetime() - self.issued_at.as_datetime()).num_seconds() > self.ttl_secs
    }
}

/// A single-use store of outstanding auth codes.
///
/// Grounded in the same `RwLock<HashMap<_, _>>` fake-store idiom used by
/// [`tansive_catalog::store::InMemoryCatalog`] and the teacher's
/// `CapabilityStore`.
#[derive(Default)]
pub struct AuthCodeStore {
    codes: RwLock<HashMap<String, AuthCodeGrant>>,
}

impl AuthCodeStore {
    /// Build an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint and store a grant, returning the code to hand back to the caller.
    pub fn issue(&self, grant: AuthCodeGrant) -> String {
        let code = generate_auth_code();
        self.codes.write().unwrap_or_else(|e| e.into_inner()).insert(code.clone(), grant);
        code
    }

    /// Redeem `code` with `code_verifier`, consuming it on success or
    /// failure alike (single-use, §4.5 step 4).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PkceFailed`] if the code is unknown, expired,
    /// or `code_verifier` does not hash to the stored challenge.
    pub fn redeem(&self, code: &str, code_verifier: &str, now: Timestamp) -> SessionResult<AuthCodeGrant> {
        let grant = self
            .codes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(code)
            .ok_or_else(|| SessionError::PkceFailed("unknown or already consumed code".into()))?;

        if grant.is_expired(now) {
            return Err(SessionError::PkceFailed("code expired".into()));
        }
        if code_challenge_from_verifier(code_verifier) != grant.code_challenge {
            return Err(SessionError::PkceFailed("code_verifier does not match code_challenge".into()));
        }
        Ok(grant)
    }
}
