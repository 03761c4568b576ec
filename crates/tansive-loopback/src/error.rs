//! Errors raised while standing up the loopback socket itself (not the
//! per-request errors returned in `POST /skill-invocations` bodies, which
//! are always HTTP 200 per §4.10).

use thiserror::Error;

/// Errors binding or serving the loopback UDS.
#[derive(Debug, Error)]
pub enum LoopbackError {
    /// Binding the Unix domain socket failed.
    #[error("failed to bind loopback socket at {path}: {source}")]
    Bind {
        /// The socket path that failed to bind.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Setting the socket's file mode failed.
    #[error("failed to set loopback socket permissions: {0}")]
    Permissions(std::io::Error),
}

/// Result type for loopback server setup.
pub type LoopbackResult<T> = Result<T, LoopbackError>;
