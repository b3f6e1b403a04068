//! Errors surfaced by the workbench and the flow runner

use std::path::PathBuf;
use teller_core::CoreError;
use teller_http::ClientError;
use thiserror::Error;

/// Result type for workbench operations
pub type WorkbenchResult<T> = std::result::Result<T, WorkbenchError>;

/// Why a workbench operation did not complete
#[derive(Debug, Error)]
pub enum WorkbenchError {
    /// Registry lookup failed before any request was made
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Identity {0} has no refresh token. Log in again.")]
    MissingRefreshToken(String),

    #[error("Unknown account reference: {0}")]
    UnknownReference(String),
}

impl WorkbenchError {
    /// Whether the operation stopped before reaching the network
    pub const fn is_short_circuit(&self) -> bool {
        matches!(
            self,
            Self::Core(_) | Self::MissingRefreshToken(_) | Self::UnknownReference(_)
        )
    }
}

/// Errors raised while loading or running a flow file
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Failed to read flow file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid flow file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Step {index} ({action}) failed: {source}")]
    Step {
        index: usize,
        action: &'static str,
        #[source]
        source: WorkbenchError,
    },
}
