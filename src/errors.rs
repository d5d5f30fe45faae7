use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::{debug, error};

use crate::schemas::ErrorResponse;

/// Errors surfaced by services and handlers. Each variant maps to one HTTP
/// status and one machine-readable code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Email '{0}' is already registered")]
    DuplicateEmail(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid or already used token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Role '{0}' not found")]
    RoleNotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::SessionExpired | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::DuplicateEmail(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_)
            | AppError::InvalidToken
            | AppError::TokenExpired
            | AppError::RoleNotFound(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated | AppError::InvalidCredentials => "UNAUTHENTICATED",
            AppError::SessionExpired => "SESSION_EXPIRED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::RoleNotFound(_) => "ROLE_NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Maps a unique-constraint violation to `conflict`, anything else to a
    /// database error.
    pub fn on_unique_violation(err: DbErr, conflict: impl FnOnce() -> AppError) -> AppError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                debug!("Unique constraint violated: {}", detail);
                conflict()
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<analytics::AnalyticsError> for AppError {
    fn from(err: analytics::AnalyticsError) -> Self {
        match err {
            analytics::AnalyticsError::Database(db) => AppError::Database(db),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side failures are logged with details but reported generically.
        let message = if status.is_server_error() {
            error!(code = self.code(), "Request failed: {}", self);
            match &self {
                AppError::Storage(_) => "Failed to access file storage".to_string(),
                AppError::Database(_) => "Internal server error while accessing the database".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            debug!(code = self.code(), "Request rejected: {}", self);
            self.to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: self.code().to_string(),
            success: false,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let cases = [
            (AppError::Unauthenticated, StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            (AppError::SessionExpired, StatusCode::UNAUTHORIZED, "SESSION_EXPIRED"),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::DuplicateEmail("a@b.c".into()), StatusCode::CONFLICT, "DUPLICATE_EMAIL"),
            (AppError::TokenExpired, StatusCode::BAD_REQUEST, "TOKEN_EXPIRED"),
            (AppError::RoleNotFound("x".into()), StatusCode::BAD_REQUEST, "ROLE_NOT_FOUND"),
            (AppError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_non_unique_db_error_stays_database_error() {
        let err = AppError::on_unique_violation(DbErr::Custom("boom".into()), || {
            AppError::Conflict("taken".into())
        });
        assert!(matches!(err, AppError::Database(_)));
    }
}
