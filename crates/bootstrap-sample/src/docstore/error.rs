//! Error types for the document store backend.

use bootstrap_framework::ErrorKind;
use thiserror::Error;

/// Errors raised while talking to the document store's REST services.
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// The configured host could not be turned into service URLs.
    #[error("invalid cluster address: {0:?}")]
    InvalidAddress(String),

    #[error("document store credentials are not configured")]
    MissingCredentials,

    /// The request never got an HTTP answer (refused, DNS, timeout).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("credentials rejected by {url}")]
    Auth { url: String },

    /// The node answers but has never been initialized.
    #[error("cluster is not initialized")]
    NotInitialized,

    /// The cluster answers but cannot serve yet (no healthy node, bucket warming up).
    #[error("cluster not ready: {0}")]
    NotReady(String),

    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("query failed ({code}): {message}")]
    Query { code: i64, message: String },

    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

impl DocStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocStoreError::Transport { .. } => ErrorKind::Transport,
            DocStoreError::Auth { .. } => ErrorKind::Auth,
            DocStoreError::NotInitialized | DocStoreError::NotReady(_) => ErrorKind::NotReady,
            DocStoreError::Status { status, .. } if *status >= 500 => ErrorKind::NotReady,
            _ => ErrorKind::Other,
        }
    }
}
