//! API error types and the HTTP mapping of `DomainError`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chronicle_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The event store could not be prepared.
    #[error("store error: {0}")]
    Store(#[from] DomainError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Stored version of the aggregate, present on concurrency conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<i64>,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            DomainError::AggregateNotFound(_) => (StatusCode::NOT_FOUND, "aggregate_not_found"),
            DomainError::ConcurrencyConflict { .. } => {
                (StatusCode::CONFLICT, "concurrency_conflict")
            }
            DomainError::AlreadyTerminal(_) => (StatusCode::CONFLICT, "already_terminal"),
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::UnknownEventTag(_) | DomainError::UnknownEventShape(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unknown_event_type")
            }
            DomainError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            DomainError::InvalidRegistry(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "invalid_registry")
            }
            DomainError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        let current_version = match &self.0 {
            DomainError::ConcurrencyConflict { actual, .. } => Some(*actual),
            _ => None,
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
            current_version,
        };

        (status, Json(body)).into_response()
    }
}
