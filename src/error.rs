//! Error types for graph operations
//!
//! Errors are classified by who has to act:
//! - Validation: the caller sent incomplete or unrecognized input
//! - NotFound: a write referenced a borrower the graph has never seen
//! - Internal: the host failed to encode a result
//!
//! Reads never fail on absence; they return `None` instead.

use thiserror::Error;

/// Error types for graph operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub fn validation(message: impl Into<String>) -> Self {
        GraphError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        GraphError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        GraphError::Internal(message.into())
    }

    /// HTTP-style status code the hosting layer should surface.
    pub fn status_code(&self) -> u16 {
        match self {
            GraphError::Validation(_) => 400,
            GraphError::NotFound(_) => 404,
            GraphError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            GraphError::Validation(_) => ErrorType::Validation,
            GraphError::NotFound(_) => ErrorType::NotFound,
            GraphError::Internal(_) => ErrorType::Internal,
        }
    }
}

/// Serializable error representation for external collaborators
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub error_type: ErrorType,
    pub status: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Validation,
    NotFound,
    Internal,
}

impl From<&GraphError> for ErrorPayload {
    fn from(err: &GraphError) -> Self {
        ErrorPayload {
            message: err.to_string(),
            error_type: err.error_type(),
            status: err.status_code(),
        }
    }
}
