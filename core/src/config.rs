//! Client configuration.
//!
//! Read from a TOML table or from the environment:
//!
//! ```toml
//! base_url = "https://goclimb-web.onrender.com"
//! fallback = "idempotent_only"
//! ```
//!
//! `GOCLIMB_API_BASE_URL` and `GOCLIMB_API_FALLBACK` override the defaults
//! when loading from the environment.

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::http::HttpMethod;
use crate::request::ApiRequest;
use crate::resilient::FallbackPolicy;

pub const DEFAULT_BASE_URL: &str = "https://goclimb-web.onrender.com";
pub const BASE_URL_ENV: &str = "GOCLIMB_API_BASE_URL";
pub const FALLBACK_ENV: &str = "GOCLIMB_API_FALLBACK";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub fallback: FallbackPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fallback: FallbackPolicy::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, with the variable lookup supplied by the caller.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(base_url) = lookup(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let Some(fallback) = lookup(FALLBACK_ENV) {
            config.fallback = fallback.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: reason.to_string(),
        };
        let url = Url::parse(&self.base_url).map_err(|err| invalid(&err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("must not carry a query or fragment"));
        }
        Ok(())
    }

    /// A call against this configuration's base URL.
    pub fn request(&self, method: HttpMethod, path: &str) -> ApiRequest {
        ApiRequest::new(method, self.base_url.as_str(), path)
    }
}
