//! Error types for Cumulus.

use thiserror::Error;

/// Common error type for Cumulus.
#[derive(Error, Debug)]
pub enum CumulusError {
    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness conflict (e.g. an email that is already registered).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The owner's storage quota would be exceeded.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Object store (local or remote) failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CumulusError {
    /// Map an sqlx error, turning UNIQUE violations into [`CumulusError::Conflict`].
    pub fn from_insert(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return CumulusError::Conflict(format!("{what} already exists"));
            }
        }
        CumulusError::Database(e.to_string())
    }
}

impl From<sqlx::Error> for CumulusError {
    fn from(e: sqlx::Error) -> Self {
        CumulusError::Database(e.to_string())
    }
}

/// Result type alias for Cumulus operations.
pub type Result<T> = std::result::Result<T, CumulusError>;
