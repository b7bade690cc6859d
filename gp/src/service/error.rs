//! Service error types

use thiserror::Error;

/// Shown when the service gives no usable error message
pub const GENERIC_FAILURE: &str = "An error occurred. Please try again.";

/// Errors from calls to the remote plan/chat service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Non-2xx status or an `{error}` payload
    #[error("Service error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// Message suitable for showing to the user
    ///
    /// The collaborator's own message when it sent one, otherwise a fixed fallback.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Remote { message, .. } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }

    /// Check if this error is worth retrying (idempotent requests only)
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Remote { status, .. } => matches!(status, 502..=504),
            ServiceError::Network(_) => true,
            ServiceError::InvalidResponse(_) => false,
            ServiceError::Json(_) => false,
        }
    }
}
