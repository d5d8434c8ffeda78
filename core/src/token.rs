//! Attestation-token seam.
//!
//! The app-check session lives outside this crate; the dispatcher only asks
//! for the current token when a call wants one. Providers are injected, so
//! tests and tools can pass a fixed token or none at all.

use async_trait::async_trait;

use crate::error::TokenError;

/// Supplies the value for the `X-Firebase-AppCheck` header.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn current_token(&self) -> Result<String, TokenError>;
}

/// Always answers with the same token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn current_token(&self) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}

/// For builds without an attestation provider: every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

#[async_trait]
impl TokenProvider for NoToken {
    async fn current_token(&self) -> Result<String, TokenError> {
        Err(TokenError::Unavailable)
    }
}
