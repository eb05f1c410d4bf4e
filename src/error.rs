//! Application error types.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::junit::ImportError;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request body is not multipart/form-data
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Uploaded file exceeds the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Import capacity exhausted
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other server-side failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_code, response_message) = match self {
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                (
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            AppError::Internal(err_str) => {
                tracing::error!("Internal error: {}", err_str);
                ("INTERNAL_ERROR", self.to_string())
            }
            AppError::NotFound(_) => ("NOT_FOUND", self.to_string()),
            AppError::InvalidInput(_) => ("INVALID_INPUT", self.to_string()),
            AppError::UnsupportedMediaType(_) => ("UNSUPPORTED_MEDIA_TYPE", self.to_string()),
            AppError::PayloadTooLarge(_) => ("PAYLOAD_TOO_LARGE", self.to_string()),
            AppError::ServiceUnavailable(_) => ("SERVICE_UNAVAILABLE", self.to_string()),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: error_code.to_string(),
            message: response_message,
        })
    }
}

/// Error response body matching OpenAPI schema.
#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::MalformedXml(_) | ImportError::InvalidIds { .. } => {
                AppError::InvalidInput(err.to_string())
            }
            ImportError::SuiteNotInProject {
                project_id,
                suite_id,
            } => AppError::NotFound(format!(
                "Test suite {} in project {}",
                suite_id, project_id
            )),
            other => AppError::Internal(other.to_string()),
        }
    }
}
