//! Store error types.

use thiserror::Error;

/// Errors from the local persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error (structured log details).
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Row not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
