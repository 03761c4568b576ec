//! Configuration error types.

use thiserror::Error;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file's TOML did not parse.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// The file that failed to parse.
        path: String,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// The merged configuration failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The platform home/config directory could not be determined.
    #[error("could not determine a home directory for config discovery")]
    NoHomeDirectory,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
