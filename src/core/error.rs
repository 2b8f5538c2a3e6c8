// src/core/error.rs

use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong while collecting one unit of work
/// (an environment list, a history, an assessment report or a file).
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CollectError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        CollectError::Io { path: path.to_path_buf(), source }
    }

    /// Connection failures, timeouts and 5xx answers may succeed on a second
    /// attempt; everything else will not.
    pub fn is_transient(&self) -> bool {
        match self {
            CollectError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            CollectError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CollectError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
