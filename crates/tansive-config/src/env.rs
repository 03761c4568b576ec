//! Environment variable fallback layer.
//!
//! `TANSIVE_*` variables override the merged file configuration for a fixed
//! set of fields, applied after system/user/workspace files and before
//! validation — the lowest-precedence-but-last-applied layer per the
//! module doc's precedence order (env vars only take effect where no file
//! set the value more specifically... here, simply: last writer wins, and
//! env is applied last).

use toml::Value;

/// `(dotted path into the config table, environment variable name)`.
const ENV_BINDINGS: &[(&str, &str)] = &[
    ("server.host", "TANSIVE_SERVER_HOST"),
    ("server.port", "TANSIVE_SERVER_PORT"),
    ("server.signing_key_path", "TANSIVE_SERVER_SIGNING_KEY_PATH"),
    ("server.catalog_dir", "TANSIVE_SERVER_CATALOG_DIR"),
    ("server.admin_password_sha256", "TANSIVE_SERVER_ADMIN_PASSWORD_SHA256"),
    ("runtime.host", "TANSIVE_RUNTIME_HOST"),
    ("runtime.port", "TANSIVE_RUNTIME_PORT"),
    ("runtime.tangent_url", "TANSIVE_RUNTIME_TANGENT_URL"),
    ("runtime.server_url", "TANSIVE_RUNTIME_SERVER_URL"),
    ("runtime.working_dir", "TANSIVE_RUNTIME_WORKING_DIR"),
    ("runtime.audit_dir", "TANSIVE_RUNTIME_AUDIT_DIR"),
    ("runtime.trusted_script_dir", "TANSIVE_RUNTIME_TRUSTED_SCRIPT_DIR"),
];

/// Apply `TANSIVE_*` overrides onto `config`, parsing numeric fields by the
/// existing value's type so `"8080"` lands as an integer where the default
/// was one.
pub fn apply_env_overrides(config: &mut Value) {
    for (path, var) in ENV_BINDINGS {
        let Ok(raw) = std::env::var(var) else {
            continue;
        };
        set_path(config, path, &raw);
    }
}

fn set_path(config: &mut Value, path: &str, raw: &str) {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else { return };
    let mut cursor = match config.as_table_mut() {
        Some(table) => table,
        None => return,
    };
    let mut key = first;
    for next in segments {
        let Some(Value::Table(_)) = cursor.get(key) else {
            return;
        };
        let Some(Value::Table(inner)) = cursor.get_mut(key) else {
            return;
        };
        cursor = inner;
        key = next;
    }

    let existing_is_integer = matches!(cursor.get(key), Some(Value::Integer(_)));
    let value = if existing_is_integer {
        raw.parse::<i64>().map(Value::Integer).unwrap_or_else(|_| Value::String(raw.to_string()))
    } else {
        Value::String(raw.to_string())
    };
    cursor.insert(key.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;

    #[test]
    fn string_override_applies() {
        std::env::set_var("TANSIVE_SERVER_HOST", "0.0.0.0");
        let mut value: Value = toml::from_str(crate::types::DEFAULTS_TOML).unwrap();
        apply_env_overrides(&mut value);
        std::env::remove_var("TANSIVE_SERVER_HOST");
        assert_eq!(value["server"]["host"].as_str(), Some("0.0.0.0"));
    }

    #[test]
    fn integer_override_parses_as_integer() {
        std::env::set_var("TANSIVE_SERVER_PORT", "9999");
        let mut value: Value = toml::from_str(crate::types::DEFAULTS_TOML).unwrap();
        apply_env_overrides(&mut value);
        std::env::remove_var("TANSIVE_SERVER_PORT");
        let config: Config = value.try_into().unwrap();
        assert_eq!(config.server.port, 9999);
    }
}
