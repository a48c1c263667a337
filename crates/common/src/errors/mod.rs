//! Error types for OpenRepo services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Validation failures carried as field-level values, never exceptions

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using RepoError
pub type Result<T> = std::result::Result<T, RepoError>;

/// A single validation failure, addressed by field path.
///
/// Domain validation returns a list of these instead of raising; an empty
/// list means valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Authentication / authorization (2xxx-3xxx)
    Unauthorized,
    Forbidden,

    // Resource errors (4xxx)
    NotFound,
    ObjectNotFound,
    DatastreamNotFound,

    // Conflict errors (5xxx)
    Conflict,
    StaleVersion,
    IntegrityError,

    // Backend errors (7xxx-8xxx)
    DatabaseError,
    ObjectStoreError,
    SearchIndexError,
    MinterError,

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
            ErrorCode::InvalidFormat => 1002,

            // Auth (2xxx-3xxx)
            ErrorCode::Unauthorized => 2001,
            ErrorCode::Forbidden => 3001,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::ObjectNotFound => 4002,
            ErrorCode::DatastreamNotFound => 4003,

            // Conflicts (5xxx)
            ErrorCode::Conflict => 5001,
            ErrorCode::StaleVersion => 5002,
            ErrorCode::IntegrityError => 5003,

            // Backends (7xxx-8xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ObjectStoreError => 8001,
            ErrorCode::SearchIndexError => 8002,
            ErrorCode::MinterError => 8003,

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
pub enum RepoError {
    // Validation errors: invariant or schema failures, recovered locally
    // and surfaced as a list of field errors. Never advances state.
    #[error("Validation failed: {}", format_field_errors(.errors))]
    Validation { errors: Vec<FieldError> },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Authorization errors
    #[error("Forbidden: {message}")]
    PermissionDenied { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Object not found: {pid}")]
    ObjectNotFound { pid: String },

    #[error("Datastream not found: {pid}/{dsid}")]
    DatastreamNotFound { pid: String, dsid: String },

    // Conflict errors: optimistic-lock failure, caller may retry
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Stale version for {pid}: expected {expected}, found {found}")]
    StaleVersion {
        pid: String,
        expected: u64,
        found: u64,
    },

    // Integrity errors: duplicate keys, ingest races; one side succeeds,
    // the other sees this.
    #[error("Integrity error: {message}")]
    Integrity { message: String },

    // Backend I/O failures and timeouts
    #[error("Service unavailable: {service}: {message}")]
    Unavailable { service: String, message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RepoError {
    /// Shortcut for a single-field validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RepoError::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Shortcut for an Unavailable error from a named backend
    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        RepoError::Unavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            RepoError::Validation { .. } => ErrorCode::ValidationError,
            RepoError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            RepoError::Unauthorized { .. } => ErrorCode::Unauthorized,
            RepoError::PermissionDenied { .. } => ErrorCode::Forbidden,
            RepoError::NotFound { .. } => ErrorCode::NotFound,
            RepoError::ObjectNotFound { .. } => ErrorCode::ObjectNotFound,
            RepoError::DatastreamNotFound { .. } => ErrorCode::DatastreamNotFound,
            RepoError::Conflict { .. } => ErrorCode::Conflict,
            RepoError::StaleVersion { .. } => ErrorCode::StaleVersion,
            RepoError::Integrity { .. } => ErrorCode::IntegrityError,
            RepoError::Unavailable { .. } => ErrorCode::ServiceUnavailable,
            RepoError::Database(_) => ErrorCode::DatabaseError,
            RepoError::Internal { .. } => ErrorCode::InternalError,
            RepoError::Configuration { .. } => ErrorCode::ConfigurationError,
            RepoError::Serialization(_) => ErrorCode::SerializationError,
            RepoError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RepoError::Validation { .. } | RepoError::InvalidFormat { .. } => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            RepoError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            RepoError::PermissionDenied { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            RepoError::NotFound { .. }
            | RepoError::ObjectNotFound { .. }
            | RepoError::DatastreamNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            RepoError::Conflict { .. }
            | RepoError::StaleVersion { .. }
            | RepoError::Integrity { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            RepoError::Database(_)
            | RepoError::Internal { .. }
            | RepoError::Configuration { .. }
            | RepoError::Serialization(_)
            | RepoError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            RepoError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Field-level validation errors, if this is a Validation error
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            RepoError::Validation { errors } => Some(errors),
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
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

impl IntoResponse for RepoError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let fields = self.field_errors().map(|f| f.to_vec());
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
                fields,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(err: reqwest::Error) -> Self {
        // all reqwest transport failures against backends surface as
        // Unavailable; HTTP status handling happens in the clients
        let service = err
            .url()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_else(|| "upstream".to_string());
        RepoError::Unavailable {
            service,
            message: err.to_string(),
        }
    }
}

impl From<quick_xml::DeError> for RepoError {
    fn from(err: quick_xml::DeError) -> Self {
        RepoError::InvalidFormat {
            message: format!("XML: {err}"),
        }
    }
}

impl From<quick_xml::SeError> for RepoError {
    fn from(err: quick_xml::SeError) -> Self {
        RepoError::Internal {
            message: format!("XML serialization: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = RepoError::ObjectNotFound {
            pid: "test:123".into(),
        };
        assert_eq!(err.code(), ErrorCode::ObjectNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_error() {
        let err = RepoError::Validation {
            errors: vec![
                FieldError::new("title", "may not be empty"),
                FieldError::new("authors", "at least one author is required"),
            ],
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
        assert_eq!(err.field_errors().unwrap().len(), 2);
        assert!(err.to_string().contains("title: may not be empty"));
    }

    #[test]
    fn test_stale_version_is_conflict() {
        let err = RepoError::StaleVersion {
            pid: "oe:1".into(),
            expected: 3,
            found: 4,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_unavailable() {
        let err = RepoError::unavailable("solr", "connect timeout");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_server_error());
    }
}
