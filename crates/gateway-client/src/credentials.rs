//! Credential provider seam
//!
//! The engine never stores a token itself; it asks the provider whenever it
//! builds an Identify or Resume payload. A failed retrieval is surfaced as
//! an auth failure rather than retried.

use async_trait::async_trait;

/// Errors from credential retrieval
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialError {
    #[error("no credential available: {0}")]
    Unavailable(String),
}

/// Supplies the gateway token on demand
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetch the current token
    async fn token(&self) -> Result<String, CredentialError>;
}

/// A fixed token known at construction time
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn token(&self) -> Result<String, CredentialError> {
        if self.0.is_empty() {
            return Err(CredentialError::Unavailable("empty token".to_string()));
        }
        Ok(self.0.clone())
    }
}
