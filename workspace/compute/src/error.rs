use thiserror::Error;

/// Error types for the compute module
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Error from the database operations. Any open transaction has been rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Malformed or inconsistent input; nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller has no accepted access to the referenced scope.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The record does not exist, or exists outside the caller's scopes.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The external transaction feed failed or returned garbage.
    #[error("Feed error: {0}")]
    Feed(String),
}

impl From<reqwest::Error> for ComputeError {
    fn from(error: reqwest::Error) -> Self {
        ComputeError::Feed(error.to_string())
    }
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;
