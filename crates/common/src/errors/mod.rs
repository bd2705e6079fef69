//! Error types for DocLens services
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
    MissingField,
    InvalidFormat,
    PayloadTooLarge,

    // Authentication errors (2xxx)
    Unauthenticated,

    // Authorization errors (3xxx)
    Forbidden,
    NotNoteAuthor,

    // Resource errors (4xxx)
    NotFound,
    AnalysisNotFound,
    NoteNotFound,
    ShareNotFound,
    ShareLinkNotFound,
    FileNotFound,

    // Conflict errors (5xxx)
    Conflict,
    AlreadyShared,

    // Gone (share link no longer claimable)
    ShareLinkGone,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    StorageError,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::PayloadTooLarge => 1004,

            // Auth (2xxx)
            ErrorCode::Unauthenticated => 2001,

            // Authz (3xxx)
            ErrorCode::Forbidden => 3001,
            ErrorCode::NotNoteAuthor => 3002,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::AnalysisNotFound => 4002,
            ErrorCode::NoteNotFound => 4003,
            ErrorCode::ShareNotFound => 4004,
            ErrorCode::ShareLinkNotFound => 4005,
            ErrorCode::FileNotFound => 4006,

            // Conflicts (5xxx)
            ErrorCode::Conflict => 5001,
            ErrorCode::AlreadyShared => 5002,

            ErrorCode::ShareLinkGone => 5101,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            // External (8xxx)
            ErrorCode::StorageError => 8001,
            ErrorCode::UpstreamError => 8002,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Why a share link stopped being claimable.
///
/// `NotFound` is handled separately (404); these three map to 410 Gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareLinkInert {
    Revoked,
    Expired,
    MaxUsesReached,
}

impl ShareLinkInert {
    /// Machine-readable reason string used in validation payloads
    pub fn as_reason(&self) -> &'static str {
        match self {
            ShareLinkInert::Revoked => "revoked",
            ShareLinkInert::Expired => "expired",
            ShareLinkInert::MaxUsesReached => "max_uses_reached",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ShareLinkInert::Revoked => "Share link has been revoked",
            ShareLinkInert::Expired => "Share link has expired",
            ShareLinkInert::MaxUsesReached => "Share link has reached maximum uses",
        }
    }
}

impl std::fmt::Display for ShareLinkInert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthenticated { message: String },

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("You can only modify your own notes")]
    NotNoteAuthor,

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Analysis not found")]
    AnalysisNotFound { id: String },

    #[error("Note not found")]
    NoteNotFound { id: String },

    #[error("Share not found")]
    ShareNotFound { id: String },

    #[error("Share link not found")]
    ShareLinkNotFound,

    #[error("File not found")]
    FileNotFound { key: String },

    // Conflict errors
    #[error("Already shared with this email")]
    AlreadyShared { email: String },

    #[error("{0}")]
    ShareLinkGone(ShareLinkInert),

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Upstream error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for an unauthenticated-caller error
    pub fn unauthenticated() -> Self {
        AppError::Unauthenticated {
            message: "No authenticated user".to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotNoteAuthor => ErrorCode::NotNoteAuthor,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::AnalysisNotFound { .. } => ErrorCode::AnalysisNotFound,
            AppError::NoteNotFound { .. } => ErrorCode::NoteNotFound,
            AppError::ShareNotFound { .. } => ErrorCode::ShareNotFound,
            AppError::ShareLinkNotFound => ErrorCode::ShareLinkNotFound,
            AppError::FileNotFound { .. } => ErrorCode::FileNotFound,
            AppError::AlreadyShared { .. } => ErrorCode::AlreadyShared,
            AppError::ShareLinkGone(_) => ErrorCode::ShareLinkGone,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } | AppError::NotNoteAuthor => StatusCode::FORBIDDEN,

            // 404 Not Found (absence and denied access are indistinguishable on purpose)
            AppError::NotFound { .. }
            | AppError::AnalysisNotFound { .. }
            | AppError::NoteNotFound { .. }
            | AppError::ShareNotFound { .. }
            | AppError::ShareLinkNotFound
            | AppError::FileNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::AlreadyShared { .. } => StatusCode::CONFLICT,

            // 410 Gone
            AppError::ShareLinkGone(_) => StatusCode::GONE,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Storage { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
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

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
                request_id: None, // Should be filled by middleware
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::AnalysisNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::AnalysisNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Invalid title".into(),
            field: Some("title".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_gone_reasons() {
        let err = AppError::ShareLinkGone(ShareLinkInert::Expired);
        assert_eq!(err.status_code(), StatusCode::GONE);
        assert_eq!(ShareLinkInert::Expired.as_reason(), "expired");
        assert_eq!(ShareLinkInert::Revoked.as_reason(), "revoked");
        assert_eq!(
            ShareLinkInert::MaxUsesReached.as_reason(),
            "max_uses_reached"
        );
    }

    #[test]
    fn test_not_author_is_forbidden() {
        let err = AppError::NotNoteAuthor;
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), ErrorCode::NotNoteAuthor);
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
