//! Binds the loopback router to a Unix domain socket and serves it
//! (§4.10: `<working_dir>/run/tangent.service`, mode 0600).
//!
//! Grounded in the teacher's `astrid-kernel::socket::spawn_socket_server`
//! bind/spawn-per-connection shape, generalized from its raw
//! length-prefixed framing to HTTP/1.1 via `axum`/`hyper-util`.

use std::path::Path;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::UnixListener;
use tower::Service;

use crate::error::{LoopbackError, LoopbackResult};

/// Bind `socket_path` (removing any stale socket first), set its mode to
/// `0600`, and serve `app` over it until the process exits or the listener
/// errors.
pub async fn serve_unix(socket_path: &Path, app: Router) -> LoopbackResult<()> {
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LoopbackError::Bind { path: socket_path.display().to_string(), source: e })?;
    }

    let listener = UnixListener::bind(socket_path)
        .map_err(|e| LoopbackError::Bind { path: socket_path.display().to_string(), source: e })?;
    set_owner_only(socket_path)?;

    tracing::info!(path = %socket_path.display(), "loopback listening");

    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(error = %err, "loopback accept failed");
                continue;
            }
        };

        let tower_service = app.clone();
        tokio::spawn(async move {
            let socket = TokioIo::new(stream);
            let hyper_service = hyper::service::service_fn(move |request| tower_service.clone().call(request));

            if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(socket, hyper_service)
                .await
            {
                tracing::warn!(error = %err, "loopback connection error");
            }
        });
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> LoopbackResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path).map_err(LoopbackError::Permissions)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms).map_err(LoopbackError::Permissions)
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> LoopbackResult<()> {
    Ok(())
}
