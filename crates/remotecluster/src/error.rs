//! Error types for the remote cluster service.
//!
//! Every failure the service can report is a variant of [`RemoteClusterError`].
//! Errors belonging to a single send stay local to that send: they are handed
//! to its completion callback and never abort the pipelines.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the remote cluster service.
#[derive(Debug, Error)]
pub enum RemoteClusterError {
    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Remote cluster at {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid remote cluster URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    // Remote-reported errors
    #[error("Remote cluster reported failure: {message}")]
    RemoteFailure { message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Persistence collaborator errors
    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Remote cluster not found: {remote_id}")]
    RemoteClusterNotFound { remote_id: String },

    // Lifecycle errors
    #[error("Remote cluster service is not active")]
    ServiceInactive,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Topic listener for {topic} panicked")]
    ListenerPanic { topic: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for remote cluster operations.
pub type Result<T> = std::result::Result<T, RemoteClusterError>;

impl From<serde_json::Error> for RemoteClusterError {
    fn from(err: serde_json::Error) -> Self {
        RemoteClusterError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for RemoteClusterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteClusterError::Timeout(Duration::from_secs(0))
        } else if let Some(status) = err.status() {
            RemoteClusterError::HttpStatus {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                status: status.as_u16(),
            }
        } else {
            RemoteClusterError::Network {
                message: err.to_string(),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }
}

impl From<url::ParseError> for RemoteClusterError {
    fn from(err: url::ParseError) -> Self {
        RemoteClusterError::InvalidUrl {
            url: String::new(),
            message: err.to_string(),
        }
    }
}

impl RemoteClusterError {
    /// Create a store error from any displayable cause.
    pub fn store(err: impl std::fmt::Display) -> Self {
        RemoteClusterError::Store {
            message: err.to_string(),
        }
    }

    /// True for transport-level failures (including timeouts).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RemoteClusterError::Network { .. }
                | RemoteClusterError::Timeout(_)
                | RemoteClusterError::HttpStatus { .. }
                | RemoteClusterError::InvalidUrl { .. }
                | RemoteClusterError::Json { .. }
        )
    }

    /// Check if re-submitting the operation could succeed.
    ///
    /// The service itself never retries; this is advice for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteClusterError::Network { .. }
            | RemoteClusterError::Timeout(_)
            | RemoteClusterError::ServiceInactive => true,
            RemoteClusterError::HttpStatus { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}
