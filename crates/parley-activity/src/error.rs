//! Error types for parley-activity

use thiserror::Error;

/// Result type alias using parley-activity Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the agent transport
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Agent endpoint returned an error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Token acquisition failed for a reason other than a challenge
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The credential was challenged; the user has to sign in again
    #[error("Session expired. Please sign out and sign back in.")]
    SessionExpired,

    /// No authenticated user is available to act on behalf of
    #[error("User is not authenticated")]
    Unauthenticated,

    /// Operation was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An activity was sent before the conversation was created
    #[error("Conversation has not been started")]
    ConversationNotStarted,
}

impl Error {
    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this error means the credential must be renewed by the caller
    pub fn is_session_expired(&self) -> bool {
        match self {
            Error::SessionExpired => true,
            Error::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
