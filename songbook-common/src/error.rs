//! Common error types for Songbook

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Common result type for Songbook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the repository layer and the HTTP service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record does not exist
    #[error("{0}")]
    NotFound(String),

    /// Submitted data failed field validation or an application rule.
    /// Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// NotFound error for a missing row, worded after the table name
    pub fn record_not_found(table: &str) -> Self {
        Error::NotFound(format!("Record not found in table \"{}\"", table))
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}
