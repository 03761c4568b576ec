//! Config file discovery and layered loading.
//!
//! Precedence, lowest to highest before the env layer, then env wins over
//! all of them: embedded defaults → system (`/etc/tansive/config.toml`) →
//! user (`~/.config/tansive/config.toml`, via `directories`) → workspace
//! (`<workspace_root>/.tansive/config.toml`) → `TANSIVE_*` env vars.

use std::path::{Path, PathBuf};

use toml::Value;
use tracing::{debug, info};

use crate::env::apply_env_overrides;
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::{Config, DEFAULTS_TOML};
use crate::validate;

/// Load configuration with the full precedence chain.
///
/// `workspace_root` is the current project root; pass `None` to skip the
/// workspace layer (e.g. when running outside a project directory).
///
/// # Errors
///
/// Returns a [`ConfigError`] if any layer fails to parse or the merged
/// result fails validation.
pub fn load(workspace_root: Option<&Path>) -> ConfigResult<Config> {
    let mut merged: Value = toml::from_str(DEFAULTS_TOML).expect("embedded defaults.toml must parse");

    if let Some(overlay) = try_load_file(Path::new("/etc/tansive/config.toml"))? {
        deep_merge(&mut merged, &overlay);
        info!("loaded system config from /etc/tansive/config.toml");
    }

    if let Some(user_path) = user_config_path() {
        if let Some(overlay) = try_load_file(&user_path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %user_path.display(), "loaded user config");
        }
    }

    if let Some(root) = workspace_root {
        let workspace_path = root.join(".tansive").join("config.toml");
        if let Some(overlay) = try_load_file(&workspace_path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %workspace_path.display(), "loaded workspace config");
        }
    }

    apply_env_overrides(&mut merged);

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse { path: "<merged>".into(), source: e })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Load configuration from exactly one file, with no layering (used by the
/// `--config` CLI flag).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| ConfigError::Parse { path: path.display().to_string(), source: e })?;
    validate::validate(&config)?;
    Ok(config)
}

fn try_load_file(path: &Path) -> ConfigResult<Option<Value>> {
    if !path.exists() {
        debug!(path = %path.display(), "config layer absent");
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
    let value: Value = toml::from_str(&contents)
        .map_err(|e| ConfigError::Parse { path: path.display().to_string(), source: e })?;
    Ok(Some(value))
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "tansive", "tansive")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
