//! # DomainError
//!
//! Centralized error handling for the Slim Chat core.
//! Maps domain-specific failures to actionable error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// The primary error type for every port and service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Malformed or missing input fields
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// Referenced entity absent (user, dialog, message, confirm hash)
    #[error("{0}")]
    NotFound(String),

    /// Credential mismatch or acting on someone else's resource
    #[error("{0}")]
    Forbidden(String),

    /// Claim absent, malformed, tampered with or expired
    #[error("invalid token")]
    InvalidToken,

    /// Resource already exists (duplicate e-mail, duplicate dialog)
    #[error("{0}")]
    Conflict(String),

    /// Infrastructure failure (store down, queue closed)
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Shorthand for a validation failure on one field.
    pub fn invalid(field: &str, message: &str) -> Self {
        DomainError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        DomainError::Internal(err.to_string())
    }
}

/// A specialized Result type for Slim Chat logic.
pub type Result<T> = std::result::Result<T, DomainError>;
