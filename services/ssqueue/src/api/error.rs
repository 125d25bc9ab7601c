//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint returns the
//! same `{code, message}` shape, and maps queue errors onto status codes.
//!
//! # Key invariants and assumptions
//! - `NotReady` is transient and maps to 503; `NoConsumers` means the message
//!   was never buffered and maps to 410.
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::ErrorResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use ssqueue_core::QueueError;

/// Structured API error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
        },
    }
}

/// Build a 400 Bad Request validation error.
pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Build a 503 error for calls made before startup or after shutdown began.
pub fn api_not_ready() -> ApiError {
    api_error(StatusCode::SERVICE_UNAVAILABLE, "not_ready", "not ready")
}

/// Build a 410 Gone error for a non-persistent message nobody waited for.
pub fn api_no_consumers() -> ApiError {
    api_error(StatusCode::GONE, "no_consumers", "no consumers")
}

/// Build a 500 error, logging the underlying cause.
pub fn api_internal(message: &str, err: &QueueError) -> ApiError {
    tracing::error!(error = %err, "{message}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error")
}

/// Map a queue error onto its HTTP representation.
pub fn api_queue_error(err: QueueError) -> ApiError {
    match err {
        QueueError::NotReady => api_not_ready(),
        QueueError::NoConsumers { .. } => api_no_consumers(),
        other => api_internal("queue operation failed", &other),
    }
}
