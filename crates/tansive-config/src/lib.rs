//! Tansive Config — layered TOML configuration for the Server and Runtime
//! binaries (C14).
//!
//! Precedence, from lowest to highest: embedded defaults → system
//! (`/etc/tansive/config.toml`) → user (platform config dir) → workspace
//! (`<root>/.tansive/config.toml`) → `TANSIVE_*` environment variables.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod env;
pub mod error;
pub mod loader;
mod merge;
pub mod types;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::{Config, RuntimeConfig, ServerConfig};

impl Config {
    /// Load with the full precedence chain.
    ///
    /// # Errors
    ///
    /// See [`loader::load`].
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(workspace_root)
    }

    /// Load a single file with no layering.
    ///
    /// # Errors
    ///
    /// See [`loader::load_file`].
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
