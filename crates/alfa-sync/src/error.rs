//! Sync error types.

use thiserror::Error;

/// Errors that can occur during synchronization and import.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad input; rejected before any side effect.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A sync run is already in progress (single-flight).
    #[error("A sync operation is already running")]
    AlreadyRunning,

    /// Manual trigger rejected during the inter-run cooldown.
    #[error("Sync was completed recently; retry in {remaining_seconds} seconds")]
    Cooldown { remaining_seconds: u64 },

    /// CRM error.
    #[error("CRM error: {0}")]
    Crm(#[from] alfa_crm::CrmError),

    /// Local store error.
    #[error("Store error: {0}")]
    Store(#[from] alfa_db::StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this is a pre-flight rejection (no run row was created).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SyncError::Validation { .. } | SyncError::AlreadyRunning | SyncError::Cooldown { .. }
        )
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::validation("max_records cannot exceed 1000");
        assert!(err.to_string().contains("max_records"));

        let err = SyncError::Cooldown {
            remaining_seconds: 240,
        };
        assert!(err.to_string().contains("240"));
    }

    #[test]
    fn test_is_rejection() {
        assert!(SyncError::AlreadyRunning.is_rejection());
        assert!(SyncError::validation("bad").is_rejection());
        assert!(!SyncError::internal("boom").is_rejection());
    }
}
