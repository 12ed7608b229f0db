//! Client error types

use shared::error::ApiError;
use thiserror::Error;

/// Client error type
///
/// Stale responses and identity-mismatched notifications are not errors:
/// they are discarded silently inside the engine and never reach here.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No response / timeout; the local prediction is rolled back and a
    /// resync is scheduled
    #[error("Network failure: {0}")]
    Network(String),

    /// Backend rejected the request with a typed error body
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Unmet precondition caught locally, before any call went out
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Channel or session closed
    #[error("Closed")]
    Closed,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ClientError::Validation(msg.into())
    }

    /// Whether this failure represents an unmet precondition (no rollback
    /// needed) rather than a transport fault (rollback + resync)
    pub fn is_validation(&self) -> bool {
        match self {
            ClientError::Validation(_) => true,
            ClientError::Api(api) => api.is_validation(),
            _ => false,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
