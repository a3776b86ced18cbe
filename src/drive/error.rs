//! Drive API error types.

use crate::auth::AuthError;
use thiserror::Error;

/// Result type for Drive operations.
pub type DriveResult<T> = Result<T, DriveError>;

/// Errors that can occur while talking to the Drive API.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Drive API returned {status} for {context}: {message}")]
    Status {
        status: u16,
        context: String,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriveError {
    pub fn from_http_status(status: u16, context: impl Into<String>, message: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            404 => Self::NotFound(context),
            _ => Self::Status {
                status,
                context,
                message: message.into(),
            },
        }
    }

    /// Authentication problems end the whole run rather than one folder or link.
    pub fn is_auth(&self) -> bool {
        matches!(self, DriveError::Auth(_)) || matches!(self, DriveError::Status { status: 401, .. })
    }
}
