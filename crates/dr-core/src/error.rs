//! # AppError
//!
//! Centralized error handling for the DE Rantau backend.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

use crate::schema::FieldErrors;

/// The primary error type for all dr-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Region, Hub, Review)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., missing name, rating out of range)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Missing or rejected session token
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Infrastructure failure (e.g., DB down)
    #[error("internal service error: {0}")]
    Internal(String),

    /// Resource already exists or violates a constraint
    #[error("conflict: {0}")]
    Conflict(String),
}

impl AppError {
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound(kind.into(), id.to_string())
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::ValidationError(errors.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for DE Rantau logic.
pub type Result<T> = std::result::Result<T, AppError>;
