//! Authenticated dispatch with a single unauthenticated fallback.
//!
//! Every call goes out with the app-check token first. It is repeated once,
//! unchanged except for the missing header, when the backend answers exactly
//! 403 or when no token could be obtained. Every other outcome of the first
//! attempt, including 4xx, 5xx, malformed 2xx bodies and transport failures,
//! is returned as-is: a request that timed out may already have been applied.
//!
//! Repeating a POST after a 403 is only safe if the backend rejects the token
//! before running any side effect. That ordering is not checked here;
//! `FallbackPolicy::IdempotentOnly` limits the retry to GET, PUT and DELETE
//! for deployments that cannot rely on it.

use std::str::FromStr;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::envelope::ApiResponse;
use crate::error::{ConfigError, DispatchError, TokenError};
use crate::http::HttpMethod;
use crate::request::{ApiRequest, RequestPayload};

const FORBIDDEN: u16 = 403;

/// Which methods may be repeated without the token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[default]
    AllMethods,
    IdempotentOnly,
}

impl FallbackPolicy {
    pub const fn allows(self, method: HttpMethod) -> bool {
        match self {
            Self::AllMethods => true,
            Self::IdempotentOnly => method.is_idempotent(),
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "all_methods" => Ok(Self::AllMethods),
            "idempotent_only" => Ok(Self::IdempotentOnly),
            other => Err(ConfigError::UnknownFallback(other.to_string())),
        }
    }
}

/// Result of `make_request_detailed`.
#[derive(Debug, Clone)]
pub struct Outcome<R> {
    pub envelope: R,
    /// HTTP status of the returned envelope was 2xx.
    pub ok: bool,
    /// 1, or 2 when the fallback ran (even if the first attempt never
    /// reached the network because no token was available).
    pub attempts: u8,
}

impl<R> Outcome<R> {
    const fn new(envelope: R, ok: bool, attempts: u8) -> Self {
        Self { envelope, ok, attempts }
    }
}

#[derive(Clone)]
pub struct ResilientDispatcher {
    dispatcher: Dispatcher,
    policy: FallbackPolicy,
}

impl ResilientDispatcher {
    pub const fn new(dispatcher: Dispatcher, policy: FallbackPolicy) -> Self {
        Self { dispatcher, policy }
    }

    /// Use the fallback policy from `config`.
    pub fn from_config(dispatcher: Dispatcher, config: &ApiConfig) -> Self {
        Self::new(dispatcher, config.fallback)
    }

    pub const fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub async fn make_request<R: ApiResponse>(&self, request: &ApiRequest) -> R {
        self.make_request_detailed(request).await.envelope
    }

    pub async fn make_request_detailed<R: ApiResponse>(&self, request: &ApiRequest) -> Outcome<R> {
        info!(method = %request.method, path = %request.path, "attempting request with app check token");
        let first: DispatchResult<R> = self.dispatcher.send(request, true).await;

        let cause = match first {
            Ok(dispatched) if dispatched.ok => {
                info!(status = dispatched.status(), "request succeeded with app check token");
                return Outcome::new(dispatched.envelope, true, 1);
            }
            Ok(dispatched) if dispatched.status() == FORBIDDEN => Fallback::Forbidden(dispatched.envelope),
            Ok(dispatched) => {
                warn!(
                    status = dispatched.status(),
                    "request failed with app check token, not retrying"
                );
                return Outcome::new(dispatched.envelope, false, 1);
            }
            Err(DispatchError::Token(err)) => Fallback::NoToken(err),
            Err(err) => {
                error!(error = %err, "request failed with app check token, not retrying");
                return Outcome::new(network_failure(&err), false, 1);
            }
        };

        if !self.policy.allows(request.method) {
            warn!(
                method = %request.method,
                policy = ?self.policy,
                "fallback without app check token not allowed for this method"
            );
            return match cause {
                Fallback::Forbidden(envelope) => Outcome::new(envelope, false, 1),
                Fallback::NoToken(err) => Outcome::new(network_failure(&DispatchError::from(err)), false, 1),
            };
        }

        match &cause {
            Fallback::Forbidden(_) => info!("app check rejected (403), retrying without token"),
            Fallback::NoToken(err) => info!(error = %err, "no app check token, retrying without token"),
        }

        match self.dispatcher.send::<R>(request, false).await {
            Ok(dispatched) => {
                if dispatched.ok {
                    info!(status = dispatched.status(), "request succeeded without app check token");
                } else {
                    error!(status = dispatched.status(), "request failed even without app check token");
                }
                let ok = dispatched.ok;
                Outcome::new(dispatched.envelope, ok, 2)
            }
            Err(err) => {
                error!(error = %err, "request failed without app check token");
                Outcome::new(network_failure(&err), false, 2)
            }
        }
    }

    pub async fn get<R: ApiResponse>(&self, base_url: &str, path: &str, payload: RequestPayload) -> R {
        self.make_request(&ApiRequest::get(base_url, path).with_payload(payload))
            .await
    }

    pub async fn post<R: ApiResponse>(&self, base_url: &str, path: &str, payload: RequestPayload) -> R {
        self.make_request(&ApiRequest::post(base_url, path).with_payload(payload))
            .await
    }

    pub async fn put<R: ApiResponse>(&self, base_url: &str, path: &str, payload: RequestPayload) -> R {
        self.make_request(&ApiRequest::put(base_url, path).with_payload(payload))
            .await
    }

    pub async fn delete<R: ApiResponse>(&self, base_url: &str, path: &str, payload: RequestPayload) -> R {
        self.make_request(&ApiRequest::delete(base_url, path).with_payload(payload))
            .await
    }
}

enum Fallback<R> {
    Forbidden(R),
    NoToken(TokenError),
}

fn network_failure<R: ApiResponse>(err: &DispatchError) -> R {
    R::network_failure(format!("Network error: {err}"))
}
