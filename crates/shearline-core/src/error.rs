//! Error types for the request gateway.

use thiserror::Error;

use crate::config::ConfigError;
use crate::credentials::StoreError;

/// Message used when a failed response carries no usable server message.
pub const DEFAULT_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Classified outcome of a failed backend call.
///
/// This is a closed set: every failure leaving the gateway is one of these
/// four kinds. Only [`GatewayError::AuthenticationExpired`] is ever handled
/// locally (by refresh and replay); everything else passes straight through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The backend rejected the access token (HTTP 401).
    #[error("Authentication expired")]
    AuthenticationExpired,

    /// The caller is authenticated but not allowed to do this (HTTP 403).
    #[error("Authorization denied")]
    AuthorizationDenied,

    /// Any other HTTP error response.
    #[error("API error ({status}): {message}")]
    ApiFailure {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Server supplied message, or [`DEFAULT_ERROR_MESSAGE`].
        message: String,
    },

    /// No HTTP response was received (timeout, DNS, connection reset).
    #[error("Network failure: {0}")]
    NetworkFailure(String),
}

impl GatewayError {
    /// Whether this error can be recovered by refreshing credentials.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationExpired)
    }

    /// HTTP status associated with this error, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationExpired => Some(401),
            Self::AuthorizationDenied => Some(403),
            Self::ApiFailure { status, .. } => Some(*status),
            Self::NetworkFailure(_) => None,
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Top-level error for session and setup operations.
#[derive(Error, Debug)]
pub enum ShearlineError {
    /// A backend call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Credential storage failed.
    #[error("Credential storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for session and setup operations.
pub type Result<T> = std::result::Result<T, ShearlineError>;
