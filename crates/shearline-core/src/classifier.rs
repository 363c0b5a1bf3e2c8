//! Maps raw exchange outcomes onto [`GatewayError`] kinds.
//!
//! Classification is pure: no retries, no logging side effects beyond debug
//! tracing, no credential access.

use tracing::debug;

use crate::error::{GatewayError, GatewayResult, DEFAULT_ERROR_MESSAGE};
use crate::transport::{ApiResponse, RawOutcome};

/// Splits an outcome into a successful response or a classified error.
pub fn classify(outcome: RawOutcome) -> GatewayResult<ApiResponse> {
    match outcome {
        RawOutcome::Response { status, body } if status < 400 => Ok(ApiResponse { status, body }),
        RawOutcome::Response { status, body } => Err(classify_status(status, &body)),
        RawOutcome::NoResponse(reason) => {
            debug!(reason = %reason, "Classified as network failure");
            Err(GatewayError::NetworkFailure(reason))
        }
    }
}

/// Classifies an HTTP error status.
pub fn classify_status(status: u16, body: &str) -> GatewayError {
    let err = match status {
        401 => GatewayError::AuthenticationExpired,
        403 => GatewayError::AuthorizationDenied,
        _ => GatewayError::ApiFailure {
            status,
            message: server_message(body).unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        },
    };
    debug!(status, kind = %err, "Classified error response");
    err
}

/// Pulls `message` (or `error`) out of a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|field| value.get(*field).and_then(serde_json::Value::as_str))
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
}
