//! Error types shared by the source backends, harvester and pipeline.
//!
//! Backend failures are [`SourceError`]; everything that can go wrong while
//! turning one archive into documents and workbooks is a [`HarvestError`].
//! The pipeline decides which of these are recoverable (per archive, per
//! directory) and which abort a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("path not found: {0}")]
    NotFound(String),

    /// Login rejected over FTPS and again over the plain FTP fallback.
    #[error("login to {server} rejected: {reason}")]
    Auth { server: String, reason: String },

    #[error("transfer failed for {path}: {source}")]
    Transient {
        path: String,
        #[source]
        source: suppaftp::FtpError,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            SourceError::NotFound(path)
        } else {
            SourceError::Io { path, source }
        }
    }
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("corrupt archive {path}: {source}")]
    CorruptArchive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("unreadable workbook {entry}: {reason}")]
    Workbook { entry: String, reason: String },
}
