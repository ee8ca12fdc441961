//! JSON envelopes shared by every handler.
//!
//! Success bodies carry a `result` field when returning data and are empty
//! objects otherwise; failure bodies always carry a string `error` field.

use serde::Serialize;

/// Success envelope wrapping a payload.
#[derive(Debug, Serialize)]
pub struct ResultResponse<T> {
    pub result: T,
}

/// Error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Probe envelope for the file-store state endpoint: probe failures are
/// reported in the body, not as an HTTP failure.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
