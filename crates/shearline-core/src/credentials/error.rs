//! Error types for credential storage.

use thiserror::Error;

/// Credential storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credentials file has no parent directory or an unknown layout.
    #[error("Invalid credentials file: {0}")]
    InvalidFormat(String),

    /// HOME is not set, so the default location cannot be resolved.
    #[error("Cannot resolve credentials path: {0}")]
    NoHome(String),
}

/// Result type alias for credential storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
