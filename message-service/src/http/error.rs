//! HTTP error type for the message endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use message_store::StoreError;
use tracing::{debug, error, warn};

/// Error wrapper for converting request and store failures to HTTP responses.
///
/// Only an empty required field carries a body; every other error answers with
/// the status alone.
#[derive(Debug)]
pub enum ApiError {
    /// Unparsable path, query or body.
    Malformed(String),
    /// A required field was present but empty.
    EmptyField(&'static str),
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Malformed(reason) => {
                debug!(%reason, "Rejected malformed request");
                StatusCode::BAD_REQUEST.into_response()
            }
            ApiError::EmptyField(field) => (
                StatusCode::BAD_REQUEST,
                format!("Field \"{}\" cannot be empty", field),
            )
                .into_response(),
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
            ApiError::Store(StoreError::AlreadyExists(id)) => {
                warn!(%id, "Insert collided with an existing message");
                StatusCode::CONFLICT.into_response()
            }
            ApiError::Store(e) => {
                error!(error = %e, "Store operation failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
