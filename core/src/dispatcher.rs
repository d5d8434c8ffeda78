//! Request dispatcher: token, transport, parse, envelope.
//!
//! # Design
//! `Dispatcher::send` runs one call through `Built -> Sent -> Parsed` and
//! reports every expected failure as a value. A reply of any status becomes
//! `Ok(Dispatched)`, with `ok` telling whether the status was 2xx and the
//! envelope telling whether the backend considered the call a success; the
//! two are independent and callers check both. Only a missing token or a
//! transport failure, both of which leave no envelope, come back as
//! `Err(DispatchError)`.

use std::any::type_name;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::diagnostics::{render_full_response, render_response, RequestSummary};
use crate::envelope::ApiResponse;
use crate::error::DispatchError;
use crate::http::HttpResponse;
use crate::request::ApiRequest;
use crate::token::TokenProvider;
use crate::transport::Transport;

/// A call that got a reply.
#[derive(Debug, Clone)]
pub struct Dispatched<R> {
    /// HTTP status was 2xx.
    pub ok: bool,
    /// Built from the body, or defaults if it was not JSON; `status` is
    /// always the HTTP status.
    pub envelope: R,
    /// Parsed body, `None` when it was not valid JSON.
    pub json: Option<Value>,
    /// Body text as received.
    pub raw: String,
    pub request: RequestSummary,
}

impl<R: ApiResponse> Dispatched<R> {
    pub fn status(&self) -> u16 {
        self.envelope.status()
    }

    pub fn log_response(&self, prefix: &str) -> String {
        render_response(prefix, &self.request, Some(&self.envelope))
    }

    pub fn log_full_response(&self, prefix: &str) -> String {
        render_full_response(prefix, &self.request, Some(&self.envelope), self.json.as_ref())
    }
}

pub type DispatchResult<R> = Result<Dispatched<R>, DispatchError>;

/// Sends `ApiRequest`s through an injected transport and token provider.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { transport, tokens }
    }

    pub async fn send<R: ApiResponse>(&self, request: &ApiRequest, attach_token: bool) -> DispatchResult<R> {
        let summary = RequestSummary::new(request, attach_token);

        let token = if attach_token {
            match self.tokens.current_token().await {
                Ok(token) => Some(token),
                Err(err) => {
                    error!(
                        method = %request.method,
                        url = %summary.full_url,
                        error = %err,
                        "failed to obtain app check token"
                    );
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        let http = request.build(token.as_deref());
        debug!(method = %http.method, url = %http.url, attach_token, "sending request");

        let response = match self.transport.execute(http).await {
            Ok(response) => response,
            Err(err) => {
                error!(
                    method = %request.method,
                    url = %summary.full_url,
                    attach_token,
                    error = %err,
                    "network error"
                );
                return Err(err.into());
            }
        };

        let dispatched = parse_response::<R>(response, summary);
        let prefix = type_name::<R>();
        if dispatched.ok {
            info!(
                method = %request.method,
                url = %dispatched.request.full_url,
                status = dispatched.status(),
                success = dispatched.envelope.success(),
                "request succeeded"
            );
            debug!("{}", dispatched.log_response(prefix));
        } else {
            warn!(
                method = %request.method,
                url = %dispatched.request.full_url,
                status = dispatched.status(),
                "request failed"
            );
            debug!("{}", dispatched.log_full_response(prefix));
        }
        Ok(dispatched)
    }
}

/// Parse a reply into `R`. A body that is not JSON is logged with its raw
/// text and yields a default envelope; `status` is stamped either way.
pub fn parse_response<R: ApiResponse>(response: HttpResponse, request: RequestSummary) -> Dispatched<R> {
    let json = match serde_json::from_str::<Value>(&response.body) {
        Ok(json) => Some(json),
        Err(err) => {
            error!(
                status = response.status,
                url = %request.full_url,
                error = %err,
                raw = %response.body,
                "failed to parse response body as JSON"
            );
            None
        }
    };
    let mut envelope = R::from_body(json.as_ref());
    envelope.base_mut().status = response.status;
    Dispatched {
        ok: response.is_success(),
        envelope,
        json,
        raw: response.body,
        request,
    }
}
