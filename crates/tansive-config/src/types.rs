//! Configuration struct definitions for both binaries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The unified configuration tree: one section per binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Control-plane (`tansive-server`) settings.
    pub server: ServerConfig,
    /// Local runtime (`tansive-runtime`) settings.
    pub runtime: RuntimeConfig,
}

/// Settings for the `tansive-server` binary (§6, C4, C5, C11).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Where the Ed25519 token-signing key is loaded from (or generated at).
    pub signing_key_path: PathBuf,
    /// PKCE auth-code time-to-live, in seconds. Spec caps this at 60 (§3).
    pub auth_code_ttl_secs: i64,
    /// Maximum lifetime of a minted access/identity token, in seconds.
    pub max_token_age_secs: i64,
    /// Directory the catalog's fake/blob backend persists under.
    pub catalog_dir: PathBuf,
    /// The single-user identity this Server authenticates `/auth/login`
    /// against. Full user/tenant directory management is out of scope
    /// (§1); this is enough to exercise the login → view-adoption →
    /// session flow end to end.
    pub single_user_id: String,
    /// The tenant the single user belongs to.
    pub single_tenant_id: String,
    /// SHA-256 hex digest of the login password. Never the password
    /// itself, so a leaked config file doesn't leak the credential.
    pub admin_password_sha256: String,
}

/// Settings for the `tansive-runtime` binary (§6, C1, C6, C8, C9, C10).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Bind host for the Runtime's HTTP surface.
    pub host: String,
    /// Bind port for the Runtime's HTTP surface.
    pub port: u16,
    /// The URL the Server hands out as `tangent_url` (this Runtime's base URL).
    pub tangent_url: String,
    /// The Server base URL this Runtime redeems PKCE codes against.
    pub server_url: String,
    /// Root directory the Runtime keeps session state under
    /// (`<working_dir>/run/tangent.service`, per-session `$HOME`s, audit logs).
    pub working_dir: PathBuf,
    /// Directory audit logs are written to before packaging/upload.
    pub audit_dir: PathBuf,
    /// Root trusted scripts must resolve inside of (§4.8).
    pub trusted_script_dir: PathBuf,
    /// Call graph depth bound. `0` means unbounded (§3, §4.2).
    pub max_call_depth: u32,
    /// Audit log writer buffered-entry flush interval (§4.1).
    pub flush_interval: usize,
    /// Byte threshold above which a finalized log is Snappy-compressed (§4.12).
    pub compress_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULTS_TOML).expect("embedded defaults.toml must parse")
    }
}

/// Embedded default configuration, compiled into the binary.
pub const DEFAULTS_TOML: &str = include_str!("defaults.toml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse_and_are_sane() {
        let config = Config::default();
        assert!(config.server.port > 0);
        assert!(config.runtime.max_call_depth <= 64);
        assert!(config.runtime.flush_interval >= 1);
    }
}
