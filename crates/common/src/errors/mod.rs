//! Error types for RankForge
//!
//! Provides a single error enum shared by the engine and the gateway with:
//! - Distinct variants for request validation, degraded retrieval and
//!   infrastructure failures
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidWeights,
    InvalidMatchCount,
    InvalidRrfK,
    InvalidThreshold,
    InvalidOperator,
    MalformedFilter,
    InvalidRange,
    DimensionMismatch,
    NoEnabledMethod,

    // Resource errors (4xxx)
    NotFound,
    RecordNotFound,

    // Conflict errors (5xxx)
    DuplicateRecord,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    EmbeddingTimeout,
    MissingEmbedding,
    CacheError,

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
            ErrorCode::InvalidWeights => 1002,
            ErrorCode::InvalidMatchCount => 1003,
            ErrorCode::InvalidRrfK => 1004,
            ErrorCode::InvalidThreshold => 1005,
            ErrorCode::InvalidOperator => 1006,
            ErrorCode::MalformedFilter => 1007,
            ErrorCode::InvalidRange => 1008,
            ErrorCode::DimensionMismatch => 1009,
            ErrorCode::NoEnabledMethod => 1010,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::RecordNotFound => 4002,

            // Conflicts (5xxx)
            ErrorCode::DuplicateRecord => 5001,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            // External (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::EmbeddingTimeout => 8003,
            ErrorCode::MissingEmbedding => 8004,
            ErrorCode::CacheError => 8006,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
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
        field: Option<String>,
    },

    #[error("Invalid weights: {message}")]
    InvalidWeights { message: String },

    #[error("Invalid match count {value}: must be between 1 and {max}")]
    InvalidMatchCount { value: usize, max: usize },

    #[error("Invalid RRF constant {value}: must be at least 1")]
    InvalidRrfK { value: u32 },

    #[error("Invalid fuzzy threshold {value}: must be within [0, 1]")]
    InvalidThreshold { value: f64 },

    #[error("Operator '{operator}' is not allowed on {inferred_type} field '{field}'")]
    InvalidOperator {
        field: String,
        operator: String,
        inferred_type: String,
    },

    #[error("Malformed filter at {path}: {message}")]
    MalformedFilter { path: String, message: String },

    #[error("Invalid range for document {doc_id}: start {start_index} > end {end_index}")]
    InvalidRange {
        doc_id: String,
        start_index: i32,
        end_index: i32,
    },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No retrieval method is enabled: every weight is at or below the disable threshold")]
    NoEnabledMethod,

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Conflict errors
    #[error("Duplicate record: {message}")]
    DuplicateRecord { message: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding timeout after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("Dense retrieval requires a query embedding")]
    MissingEmbedding,

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("HTTP client error: {0}")]
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
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidWeights { .. } => ErrorCode::InvalidWeights,
            AppError::InvalidMatchCount { .. } => ErrorCode::InvalidMatchCount,
            AppError::InvalidRrfK { .. } => ErrorCode::InvalidRrfK,
            AppError::InvalidThreshold { .. } => ErrorCode::InvalidThreshold,
            AppError::InvalidOperator { .. } => ErrorCode::InvalidOperator,
            AppError::MalformedFilter { .. } => ErrorCode::MalformedFilter,
            AppError::InvalidRange { .. } => ErrorCode::InvalidRange,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::NoEnabledMethod => ErrorCode::NoEnabledMethod,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DuplicateRecord { .. } => ErrorCode::DuplicateRecord,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::EmbeddingTimeout { .. } => ErrorCode::EmbeddingTimeout,
            AppError::MissingEmbedding => ErrorCode::MissingEmbedding,
            AppError::CacheError { .. } => ErrorCode::CacheError,
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
            | AppError::InvalidWeights { .. }
            | AppError::InvalidMatchCount { .. }
            | AppError::InvalidRrfK { .. }
            | AppError::InvalidThreshold { .. }
            | AppError::InvalidOperator { .. }
            | AppError::MalformedFilter { .. }
            | AppError::InvalidRange { .. }
            | AppError::DimensionMismatch { .. }
            | AppError::NoEnabledMethod
            | AppError::MissingEmbedding => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::DuplicateRecord { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingError { .. }
            | AppError::EmbeddingTimeout { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::CacheError { .. } | AppError::ServiceUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Structured details for variants that carry more than a message
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation {
                field: Some(field), ..
            } => Some(json!({ "field": field })),
            AppError::InvalidOperator {
                field,
                operator,
                inferred_type,
            } => Some(json!({
                "field": field,
                "operator": operator,
                "inferred_type": inferred_type,
            })),
            AppError::MalformedFilter { path, .. } => Some(json!({ "path": path })),
            AppError::InvalidRange {
                doc_id,
                start_index,
                end_index,
            } => Some(json!({
                "doc_id": doc_id,
                "start_index": start_index,
                "end_index": end_index,
            })),
            AppError::DimensionMismatch { expected, actual } => {
                Some(json!({ "expected": expected, "actual": actual }))
            }
            _ => None,
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
    pub numeric_code: u16,
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

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                numeric_code: code.as_code(),
                details: self.details(),
                message,
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

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::InvalidRange {
            doc_id: "doc".into(),
            start_index: 4,
            end_index: 2,
        };
        assert_eq!(err.code(), ErrorCode::InvalidRange);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code().as_code(), 1008);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "query_text must not be blank".into(),
            field: Some("query_text".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert_eq!(err.details(), Some(json!({ "field": "query_text" })));
    }

    #[test]
    fn test_filter_errors_carry_details() {
        let err = AppError::InvalidOperator {
            field: "title".into(),
            operator: ">".into(),
            inferred_type: "text".into(),
        };
        let details = err.details().unwrap();
        assert_eq!(details["field"], "title");
        assert_eq!(details["inferred_type"], "text");

        let err = AppError::MalformedFilter {
            path: "$.filter.$or[1]".into(),
            message: "expected an object".into(),
        };
        assert_eq!(err.details(), Some(json!({ "path": "$.filter.$or[1]" })));
        assert!(err.to_string().contains("$.filter.$or[1]"));
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
        assert!(err.details().is_none());
    }
}
