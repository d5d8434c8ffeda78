//! Transport seam and the reqwest-backed implementation.
//!
//! # Design
//! The dispatcher never talks to the network directly: it hands an
//! `HttpRequest` to a `Transport` and gets an `HttpResponse` back. Any HTTP
//! status, 4xx and 5xx included, is a successful exchange at this level;
//! only failures that leave no status behind are `TransportError`s.
//!
//! `ReqwestTransport` sets no timeout of its own and leaves connection
//! pooling to the reqwest client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::TransportError;
use crate::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartForm, PartValue};

/// Executes one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Json(text) => builder.body(text),
            HttpBody::Multipart(form) => builder.multipart(to_reqwest_form(form)?),
        };

        let response = builder.send().await.map_err(|err| TransportError::Request {
            url: request.url.clone(),
            message: err.to_string(),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|err| TransportError::Body {
            url: request.url.clone(),
            message: err.to_string(),
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<Form, TransportError> {
    let mut out = Form::new();
    for part in form.parts {
        out = match part.value {
            PartValue::Text(value) => out.text(part.name, value),
            PartValue::File {
                file_name,
                content_type,
                bytes,
            } => {
                let mut file = Part::bytes(bytes).file_name(file_name);
                if let Some(content_type) = content_type {
                    file = file.mime_str(&content_type).map_err(|err| {
                        TransportError::InvalidRequest(format!(
                            "bad content type `{content_type}` for part `{}`: {err}",
                            part.name
                        ))
                    })?;
                }
                out.part(part.name, file)
            }
        };
    }
    Ok(out)
}
