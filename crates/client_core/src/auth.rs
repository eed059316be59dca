//! Explicit authentication context for API calls.
//!
//! The credential is owned by an external identity provider; this crate only
//! ever reads it. Callers inject a provider into [`crate::ApiClient`] at
//! construction, which makes the dependency visible at every call site
//! instead of ambient.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication credential is unavailable")]
    Unavailable,
    #[error("credential provider failed: {0}")]
    Provider(String),
}

/// Source of the bearer credential attached to authenticated requests.
/// Resolved lazily, once per request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, AuthError>;
}

/// Fixed token, for CLI use and tests.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

/// Stand-in for a signed-out session: every authenticated call fails before
/// anything is sent.
pub struct MissingCredentialProvider;

#[async_trait]
impl CredentialProvider for MissingCredentialProvider {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        Err(AuthError::Unavailable)
    }
}
