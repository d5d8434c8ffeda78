//! Text dumps of a request and its response for the log.
//!
//! Output is deterministic for a given request and envelope: fields appear
//! in mapping order, JSON is pretty-printed with a fixed indent.

use std::fmt::Write;

use serde_json::Value;

use crate::envelope::ApiResponse;
use crate::http::{HttpMethod, PartValue};
use crate::request::{join_url, ApiRequest, RequestPayload};

const DIVIDER_WIDTH: usize = 60;
const LABEL_WIDTH: usize = 14;

/// What the dumps print about the request side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub method: HttpMethod,
    pub base_url: String,
    pub path: String,
    pub full_url: String,
    pub attach_token: bool,
    pub payload: String,
}

impl RequestSummary {
    pub fn new(request: &ApiRequest, attach_token: bool) -> Self {
        Self {
            method: request.method,
            base_url: request.base_url.clone(),
            path: request.path.clone(),
            full_url: join_url(&request.base_url, &request.path),
            attach_token,
            payload: describe_payload(&request.payload),
        }
    }
}

fn describe_payload(payload: &RequestPayload) -> String {
    match payload {
        RequestPayload::Empty => "(none)".to_string(),
        RequestPayload::Fields(fields) => indent_continuation(&format!("{:#}", Value::Object(fields.clone()))),
        RequestPayload::Multipart(form) => {
            let mut text = format!("multipart form with {} parts", form.len());
            let pad = " ".repeat(LABEL_WIDTH + 5);
            for (index, part) in form.parts.iter().enumerate() {
                let value = match &part.value {
                    PartValue::Text(value) => value.clone(),
                    PartValue::File {
                        file_name,
                        content_type,
                        bytes,
                    } => format!(
                        "file {file_name} ({}, {} bytes)",
                        content_type.as_deref().unwrap_or("unknown type"),
                        bytes.len()
                    ),
                };
                let _ = write!(text, "\n{pad}[{index}] {}: {value}", part.name);
            }
            text
        }
    }
}

/// Request summary plus status, success, message, any extra envelope
/// fields, and errors.
pub fn render_response<R: ApiResponse>(prefix: &str, request: &RequestSummary, envelope: Option<&R>) -> String {
    let mut log = header(prefix, "HTTP Request Summary", request);
    log.push_str("Response:\n");
    match envelope {
        None => {
            log.push_str("  (no response envelope)\n");
        }
        Some(envelope) => {
            push_response_lines(&mut log, envelope, true);
        }
    }
    log.push_str(&divider());
    log.push('\n');
    log
}

/// Like `render_response`, followed by the parsed JSON body as received.
pub fn render_full_response<R: ApiResponse>(
    prefix: &str,
    request: &RequestSummary,
    envelope: Option<&R>,
    json: Option<&Value>,
) -> String {
    let mut log = header(prefix, "Full HTTP Request & Response Log", request);
    log.push_str("Response Summary:\n");
    match envelope {
        None => log.push_str("  (no response envelope)\n"),
        Some(envelope) => push_response_lines(&mut log, envelope, false),
    }
    log.push_str(&divider());
    log.push('\n');
    log.push_str("Raw JSON Object:\n");
    match json {
        Some(json) => {
            for line in format!("{json:#}").lines() {
                let _ = writeln!(log, "  {line}");
            }
        }
        None => log.push_str("  (no JSON object found)\n"),
    }
    log.push_str(&divider());
    log.push('\n');
    log
}

fn header(prefix: &str, title: &str, request: &RequestSummary) -> String {
    let mut log = String::new();
    let _ = writeln!(log, "{}", divider());
    let _ = writeln!(log, "{prefix}: {title}");
    let _ = writeln!(log, "{}", divider());
    push_line(&mut log, "Method", request.method.as_str());
    push_line(&mut log, "Base URL", &request.base_url);
    push_line(&mut log, "Endpoint Path", &request.path);
    push_line(&mut log, "Full URL", &request.full_url);
    push_line(&mut log, "Attach Token", if request.attach_token { "true" } else { "false" });
    push_line(&mut log, "Payload", &request.payload);
    let _ = writeln!(log, "{}", divider());
    log
}

fn push_response_lines<R: ApiResponse>(log: &mut String, envelope: &R, with_extras: bool) {
    push_line(log, "StatusCode", &envelope.status().to_string());
    push_line(log, "Success", if envelope.success() { "true" } else { "false" });
    push_line(log, "Message", envelope.message().unwrap_or("No message"));
    if with_extras {
        for (key, value) in envelope.extra_fields() {
            push_line(log, &key, &format_value(&value));
        }
    }
    push_line(log, "Errors", &format_errors(envelope.errors()));
}

fn push_line(log: &mut String, label: &str, value: &str) {
    let _ = writeln!(log, "  {label:<LABEL_WIDTH$}: {value}");
}

fn divider() -> String {
    "-".repeat(DIVIDER_WIDTH)
}

/// Continuation lines of a multi-line value line up under the first.
fn indent_continuation(text: &str) -> String {
    text.replace('\n', &format!("\n{}", " ".repeat(LABEL_WIDTH + 4)))
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(text) => format!("\"{text}\""),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => indent_continuation(&format!("{value:#}")),
    }
}

pub fn format_errors(errors: Option<&Value>) -> String {
    match errors {
        None | Some(Value::Null) => "No errors".to_string(),
        Some(Value::String(text)) if text.is_empty() => "No errors".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other @ (Value::Array(_) | Value::Object(_))) => indent_continuation(&format!("{other:#}")),
        Some(other) => other.to_string(),
    }
}
