//! Error types for parley-chat

use thiserror::Error;

/// Result type alias using parley-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a chat turn
#[derive(Error, Debug)]
pub enum Error {
    /// The caller supplied unusable input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error from the transport layer
    #[error(transparent)]
    Transport(#[from] parley_activity::Error),
}

impl Error {
    /// Check if the caller has to sign in again before retrying
    pub fn is_session_expired(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_session_expired(),
            _ => false,
        }
    }

    /// Check if this error comes from cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Transport(parley_activity::Error::Cancelled))
    }
}
