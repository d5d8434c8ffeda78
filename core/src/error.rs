//! Error types for the API layer.
//!
//! # Design
//! Only failures that leave the caller without a response envelope are
//! errors here. A non-2xx status, a body that is not JSON, or an envelope
//! with `success: false` are ordinary outcomes and travel inside
//! `Dispatched` instead. `TokenError` gets its own variant in
//! `DispatchError` because the resilient dispatcher treats a missing token
//! as a reason to retry without one.

use thiserror::Error;

/// The transport could not complete the HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, TLS or timeout failure before a status line arrived.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// A status arrived but the body could not be read.
    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    /// The request could not be turned into a transport request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// The attestation-token provider could not supply a token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no attestation token provider is configured")]
    Unavailable,

    #[error("attestation token request failed: {0}")]
    Provider(String),
}

/// A dispatch that ended before any response envelope existed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to obtain app check token: {0}")]
    Token(#[from] TokenError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Invalid or unreadable client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("unknown fallback policy `{0}` (expected `all_methods` or `idempotent_only`)")]
    UnknownFallback(String),
}
