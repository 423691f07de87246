//! Error types for the gateway
//!
//! Provides unified error handling using thiserror.

use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::backend::BackendError;
use crate::models::ErrorResponse;

// == Config Error ==
/// Raised while loading configuration from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

// == Gateway Error Enum ==
/// Errors produced while answering a request.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A path or query parameter failed validation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The backend store is unreachable
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend rejected or failed the query
    #[error("Query failed: {0}")]
    Query(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            GatewayError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Query(_) | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Connection(msg) => GatewayError::BackendUnavailable(msg),
            BackendError::Query(msg) => GatewayError::Query(msg),
        }
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::InvalidParameter(rejection.body_text())
    }
}

impl From<PathRejection> for GatewayError {
    fn from(rejection: PathRejection) -> Self {
        GatewayError::InvalidParameter(rejection.body_text())
    }
}

/// Response extension marking a response produced by a [`GatewayError`].
///
/// Lets the legacy error policy recognise failures regardless of status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFailed;

// == IntoResponse Implementation ==
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse::new(self.to_string()));

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(RequestFailed);
        response
    }
}

// == Result Type Alias ==
/// Convenience Result type for request handlers.
pub type Result<T> = std::result::Result<T, GatewayError>;
