//! Credential provider port

use thiserror::Error;

/// Credential storage errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to read credentials: {0}")]
    ReadError(String),

    #[error("Failed to write credentials: {0}")]
    WriteError(String),

    #[error("Token must not be empty")]
    EmptyToken,
}

/// Supplies the bearer token for service requests
pub trait CredentialProvider: Send + Sync {
    /// Current token, if any
    fn bearer_token(&self) -> Option<String>;

    /// Forget the token after the service rejected it
    fn invalidate(&self);
}
