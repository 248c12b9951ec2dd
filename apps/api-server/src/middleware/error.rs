//! Error handling middleware - RFC 7807 compliant responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

use promptly_core::DomainError;
use promptly_core::error::StoreError;
use promptly_shared::ErrorResponse;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Unauthorized,
    PaymentRequired(String),
    Conflict(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized => write!(f, "Unauthorized"),
            AppError::PaymentRequired(msg) => write!(f, "Payment required: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::BadRequest(detail) => ErrorResponse::bad_request(detail),
            AppError::Unauthorized => ErrorResponse::unauthorized(),
            AppError::PaymentRequired(detail) => ErrorResponse::payment_required(detail),
            AppError::Conflict(detail) => ErrorResponse::conflict(detail),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity_type, id } => {
                AppError::NotFound(format!("{} with id {} not found", entity_type, id))
            }
            DomainError::InsufficientCredits { .. } => AppError::PaymentRequired(err.to_string()),
            DomainError::Unauthenticated => AppError::Unauthorized,
            DomainError::TransactionConflict { .. } => AppError::Conflict(err.to_string()),
            DomainError::PartialFailure { .. } => AppError::Internal(err.to_string()),
            DomainError::Validation(msg) => AppError::BadRequest(msg),
            DomainError::Store(store) => store.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(path) => {
                AppError::Conflict(format!("{} was modified concurrently", path))
            }
            StoreError::NotFound(path) => AppError::NotFound(path),
            StoreError::Connection(msg) => {
                tracing::error!("Document store connection error: {}", msg);
                AppError::Internal("Document store unavailable".to_string())
            }
            StoreError::Query(msg) | StoreError::Serialization(msg) => {
                tracing::error!("Document store error: {}", msg);
                AppError::Internal("Document store error".to_string())
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (
                DomainError::InsufficientCredits { available: 0 },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (DomainError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                DomainError::TransactionConflict { attempts: 5 },
                StatusCode::CONFLICT,
            ),
            (DomainError::not_found("prompt", "p1"), StatusCode::NOT_FOUND),
            (
                DomainError::Validation("empty".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::PartialFailure {
                    completed: "following",
                    failed: "followers",
                    source: StoreError::Connection("down".to_string()),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DomainError::Store(StoreError::Conflict("catalog/alice".to_string())),
                StatusCode::CONFLICT,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }
}
