use axum::http::StatusCode;
use tracing::{error, warn};

use crate::error::TraderError;

pub mod system;
pub mod trading;

pub use system::*;
pub use trading::*;

/// Map a domain error to an HTTP status and message.
///
/// Bad input and short history are the caller's problem (400), a missing
/// policy is a readiness problem (503), everything else is ours (500).
pub fn error_response(err: TraderError) -> (StatusCode, String) {
    let status = match &err {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        TraderError::PolicyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(%status, error = %err, "request failed");
    } else {
        warn!(%status, error = %err, "request rejected");
    }
    (status, err.to_string())
}
