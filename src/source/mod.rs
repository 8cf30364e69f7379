//! Source backends: where the capture pipeline's output tree lives.
//!
//! Two independent implementations of [`SourceBackend`]:
//! - [`LocalBackend`] reads a directory tree on local disk.
//! - [`RemoteBackend`] holds one authenticated FTP(S) session for the whole run.

mod local;
mod remote;

pub use local::LocalBackend;
pub use remote::{
    is_path_safe, login_with_fallback, LoginOutcome, Protocol, RemoteBackend, RemoteCredentials,
};

use tracing::info;

use crate::config::BackendConfig;
use crate::contract::SourceBackend;
use crate::error::SourceError;

/// Builds the backend selected in configuration. Remote backends log in here,
/// so an authentication failure surfaces before any traversal starts.
pub fn connect(
    config: &BackendConfig,
    credentials: Option<&RemoteCredentials>,
) -> Result<Box<dyn SourceBackend>, SourceError> {
    match config {
        BackendConfig::Local => {
            info!("[SOURCE] Using local filesystem backend");
            Ok(Box::new(LocalBackend::new()))
        }
        BackendConfig::Remote { server } => {
            let credentials = credentials.ok_or_else(|| SourceError::Auth {
                server: server.clone(),
                reason: "no credentials supplied".into(),
            })?;
            info!(
                server = %server,
                user = %credentials.username,
                "[SOURCE] Connecting remote backend"
            );
            let backend = RemoteBackend::connect(server, credentials)?;
            info!(
                server = %backend.server(),
                protocol = ?backend.protocol(),
                "[SOURCE] Remote session ready"
            );
            Ok(Box::new(backend))
        }
    }
}

/// Last path segment of a backend path.
pub fn entry_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(|c| c == '/' || c == '\\');
    trimmed
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(trimmed)
}

/// Joins a child name onto a backend path using `/`.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else if parent.ends_with('/') {
        format!("{parent}{child}")
    } else {
        format!("{parent}/{child}")
    }
}
