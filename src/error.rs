//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::{loan::LoanStatus, title::StockPool};

/// Stable numeric error codes returned in API error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    InvalidTransition = 5,
    InsufficientStock = 6,
    NotQueueHead = 7,
    InvalidOperation = 8,
    DuplicateRequest = 9,
    BadValue = 10,
    NotAuthenticated = 11,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Cannot {action} loan {loan_id} in status {status}")]
    InvalidTransition {
        loan_id: i32,
        status: LoanStatus,
        action: &'static str,
    },

    #[error("Insufficient {pool} stock for title {title_id}")]
    InsufficientStock { title_id: i32, pool: StockPool },

    #[error("Reservation {reservation_id} is at position {position}, not at the head of the queue")]
    NotQueueHead { reservation_id: i32, position: i32 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("User {user_id} already has an open loan or reservation for title {title_id}")]
    DuplicateRequest { user_id: i32, title_id: i32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, ErrorCode::InvalidTransition),
            AppError::InsufficientStock { .. } => (StatusCode::CONFLICT, ErrorCode::InsufficientStock),
            AppError::NotQueueHead { .. } => (StatusCode::CONFLICT, ErrorCode::NotQueueHead),
            AppError::InvalidOperation(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::InvalidOperation)
            }
            AppError::DuplicateRequest { .. } => (StatusCode::CONFLICT, ErrorCode::DuplicateRequest),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            AppError::Unauthorized(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = AppError::InvalidTransition {
            loan_id: 7,
            status: LoanStatus::Returned,
            action: "extend",
        };
        assert_eq!(err.to_string(), "Cannot extend loan 7 in status returned");
    }

    #[test]
    fn test_status_mapping() {
        let err = AppError::InsufficientStock {
            title_id: 3,
            pool: StockPool::Loan,
        };
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let err = AppError::Unauthorized("staff only".to_string());
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err = AppError::InvalidOperation("already at head".to_string());
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("smtp password rejected".to_string());
        let (status, code) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, ErrorCode::Failure);
    }
}
