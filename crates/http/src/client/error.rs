//! Client error types

use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or transport failure, no response was received
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("{method} {path} failed ({status}): {body}")]
    Api {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Response body did not have the expected shape
    #[error("Unexpected response payload: {0}")]
    UnexpectedPayload(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// HTTP status of an API failure
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body of an API failure
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether the server rejected the bearer token
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self.status(), Some(401))
    }

    /// Whether the request never produced a response
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
