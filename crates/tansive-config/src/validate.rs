//! Sanity checks applied to the fully merged configuration.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] describing the first check that fails.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid("server.port must not be 0".into()));
    }
    if config.runtime.port == 0 {
        return Err(ConfigError::Invalid("runtime.port must not be 0".into()));
    }
    if config.server.auth_code_ttl_secs <= 0 || config.server.auth_code_ttl_secs > 60 {
        return Err(ConfigError::Invalid("server.auth_code_ttl_secs must be in 1..=60 (§3)".into()));
    }
    if config.server.max_token_age_secs <= 0 {
        return Err(ConfigError::Invalid("server.max_token_age_secs must be positive".into()));
    }
    if config.runtime.flush_interval == 0 {
        return Err(ConfigError::Invalid("runtime.flush_interval must be at least 1".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn rejects_auth_code_ttl_over_60() {
        let mut config = Config::default();
        config.server.auth_code_ttl_secs = 120;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.runtime.port = 0;
        assert!(validate(&config).is_err());
    }
}
