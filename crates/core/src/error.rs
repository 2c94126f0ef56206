// Central Error Type for the Application

use crate::domain::DomainError;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Actor is not allowed to perform the operation. Messages stay generic.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Out-of-order transition, double-booking attempt or concurrent loser
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidStateTransition { .. } => AppError::Conflict(err.to_string()),
            DomainError::InvalidCoordinate { .. }
            | DomainError::InvalidTimeWindow(_)
            | DomainError::ValidationError(_) => AppError::Validation(err.to_string()),
        }
    }
}

impl AppError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, AppError::Forbidden(_))
    }

    /// Storage or internal failure, as opposed to a rejected request
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Serialization(_)
                | AppError::Config(_)
                | AppError::Internal(_)
        )
    }
}

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database / AppError::Conflict
