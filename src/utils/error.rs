use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Duplicate provider reference: {0}")]
    DuplicateReference(String),

    #[error("Payment provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),

    #[error("Payment provider unreachable: {0}")]
    ProviderUnavailable(String),

    #[error("Notification delivery failed: {0}")]
    NotifierError(String),

    #[error("Ticket token space exhausted")]
    TokenExhausted,

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CapacityExceeded(_) => StatusCode::CONFLICT,
            AppError::DuplicateReference(_) => StatusCode::CONFLICT,
            AppError::ProviderRejected(_) => StatusCode::BAD_REQUEST,
            AppError::VerificationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::NotifierError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::TokenExhausted => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            AppError::DuplicateReference(_) => "DUPLICATE_REFERENCE",
            AppError::ProviderRejected(_) => "PROVIDER_REJECTED",
            AppError::VerificationFailed(_) => "VERIFICATION_FAILED",
            AppError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            AppError::NotifierError(_) => "NOTIFIER_ERROR",
            AppError::TokenExhausted => "TOKEN_EXHAUSTED",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::CapacityExceeded(msg)
            | AppError::DuplicateReference(msg)
            | AppError::ProviderRejected(msg)
            | AppError::VerificationFailed(msg)
            | AppError::ProviderUnavailable(msg)
            | AppError::NotifierError(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::TokenExhausted => {
                error!("Ticket token generation exhausted its retries");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level messages to the client; provider and
        // database internals stay in the logs.
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::CapacityExceeded(msg)
            | AppError::DuplicateReference(msg) => msg.clone(),
            AppError::ProviderRejected(_) => "Payment initialization failed".to_string(),
            AppError::VerificationFailed(_) => "Payment verification failed".to_string(),
            AppError::ProviderUnavailable(_) => {
                "Payment provider is unreachable, please try again".to_string()
            }
            AppError::NotifierError(_)
            | AppError::TokenExhausted
            | AppError::InternalServerError(_) => "An internal error occurred".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        error_response(code, public_message, None, status)
    }
}
