//! Response DTOs for the gateway
//!
//! Data routes answer with prebuilt envelopes; only error bodies are
//! modelled here.

use serde::Serialize;

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
