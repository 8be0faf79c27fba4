//! Credential seam for transports
//!
//! Acquiring and refreshing tokens is the job of whoever implements
//! [`TokenProvider`]; transports only ask for a bearer token per request and
//! translate failures into [`Error`] values.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{Error, Result};

/// Failures a token provider can report
#[derive(Error, Debug)]
pub enum TokenError {
    /// The identity platform requires the user to sign in again
    #[error("user must re-authenticate: {0}")]
    Challenge(String),

    /// There is no signed-in user to acquire a token for
    #[error("user is not authenticated")]
    Unauthenticated,

    /// Any other acquisition failure
    #[error("{0}")]
    Other(String),
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Challenge(reason) => {
                tracing::warn!("Token acquisition failed - user needs to re-authenticate: {}", reason);
                Error::SessionExpired
            }
            TokenError::Unauthenticated => Error::Unauthenticated,
            TokenError::Other(message) => Error::Auth(message),
        }
    }
}

/// Supplies bearer tokens for transport calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get an access token valid for `scope`
    async fn access_token(&self, scope: &str) -> std::result::Result<String, TokenError>;
}

/// Get the `Authorization` header value for a request
pub async fn bearer_header(provider: &dyn TokenProvider, scope: &str) -> Result<String> {
    let token = provider.access_token(scope).await?;
    Ok(format!("Bearer {}", token))
}

/// A token provider that always returns the same token
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider from a pre-acquired token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self, _scope: &str) -> std::result::Result<String, TokenError> {
        if self.token.trim().is_empty() {
            return Err(TokenError::Unauthenticated);
        }
        Ok(self.token.clone())
    }
}
