//! Error types shared by the registry and the notifier

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors raised when a session lookup cannot be satisfied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("No identity selected. Log in or switch to an identity first.")]
    NoActiveIdentity,

    #[error("Unknown identity: {key}")]
    UnknownIdentity { key: String },
}

impl CoreError {
    /// Create an unknown identity error
    pub fn unknown_identity(key: impl Into<String>) -> Self {
        Self::UnknownIdentity { key: key.into() }
    }
}
