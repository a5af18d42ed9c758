//! CRM error types.

use thiserror::Error;

/// Errors that can occur talking to the CRM.
#[derive(Debug, Error)]
pub enum CrmError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication / token refresh failure.
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// The CRM rejected the request.
    #[error("CRM API error: {code}: {message}")]
    Api { code: String, message: String },

    /// Configuration error (missing credentials, unknown region).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CrmError {
    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an API error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Result type for CRM operations.
pub type CrmResult<T> = Result<T, CrmError>;
