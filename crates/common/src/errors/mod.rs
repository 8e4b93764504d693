//! Error types for QuizForge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    UnsupportedFileType,
    PathOutsideLibrary,

    // Resource errors (4xxx)
    TextbookNotFound,
    SourceFileNotFound,

    // Conflict errors (5xxx)
    InvalidStateTransition,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,
    TransactionError,

    // Internal errors (9xxx)
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::UnsupportedFileType => 1004,
            ErrorCode::PathOutsideLibrary => 1005,

            // Resources (4xxx)
            ErrorCode::TextbookNotFound => 4002,
            ErrorCode::SourceFileNotFound => 4004,

            // Conflicts (5xxx)
            ErrorCode::InvalidStateTransition => 5002,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,
            ErrorCode::TransactionError => 7003,

            // Internal (9xxx)
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    #[error("Unsupported file type: {filename} (only PDF files are accepted)")]
    UnsupportedFileType { filename: String },

    #[error("Path is outside the textbook library: {path}")]
    PathOutsideLibrary { path: String },

    // Resource errors
    #[error("Textbook not found: {id}")]
    TextbookNotFound { id: String },

    #[error("Source file not found: {path}")]
    SourceFileNotFound { path: String },

    // Conflict errors
    #[error("Invalid processing state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::UnsupportedFileType { .. } => ErrorCode::UnsupportedFileType,
            AppError::PathOutsideLibrary { .. } => ErrorCode::PathOutsideLibrary,
            AppError::TextbookNotFound { .. } => ErrorCode::TextbookNotFound,
            AppError::SourceFileNotFound { .. } => ErrorCode::SourceFileNotFound,
            AppError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Transaction { .. } => ErrorCode::TransactionError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::UnsupportedFileType { .. } |
            AppError::PathOutsideLibrary { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::TextbookNotFound { .. } |
            AppError::SourceFileNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::InvalidStateTransition { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            AppError::Database(_) |
            AppError::DatabaseConnection { .. } |
            AppError::Transaction { .. } |
            AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Validation { field: Some(field), .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::TextbookNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::TextbookNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code().as_code(), 4002);
    }

    #[test]
    fn test_unsupported_file_type_is_client_error() {
        let err = AppError::UnsupportedFileType {
            filename: "notes.docx".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert!(err.to_string().contains("notes.docx"));
    }

    #[test]
    fn test_path_outside_library_is_client_error() {
        let err = AppError::PathOutsideLibrary {
            path: "/etc/x.pdf".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code().as_code(), 1005);
    }

    #[test]
    fn test_invalid_transition_is_conflict() {
        let err = AppError::InvalidStateTransition {
            from: "completed".into(),
            to: "processing".into(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Invalid processing state transition: completed -> processing");
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Configuration {
            message: "library directory missing".into()
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
