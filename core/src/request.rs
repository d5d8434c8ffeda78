//! Outgoing API calls and how they turn into `HttpRequest`s.
//!
//! # Design
//! An `ApiRequest` is method + base URL + path + payload and nothing else;
//! whether to attach the attestation token is decided per send, so the
//! resilient dispatcher can build the same call twice. `build` is pure: it
//! takes the token (if any) as an argument and does no I/O.

use serde_json::{Map, Value};
use tracing::warn;
use url::form_urlencoded;

use crate::http::{HttpBody, HttpMethod, HttpRequest, MultipartForm};
use crate::mapping::FieldMapped;

pub const APP_CHECK_HEADER: &str = "X-Firebase-AppCheck";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// What a call sends: nothing, wire-keyed fields, or a multipart form.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestPayload {
    #[default]
    Empty,
    Fields(Map<String, Value>),
    Multipart(MultipartForm),
}

impl RequestPayload {
    /// Encode a mapped payload to its wire fields.
    pub fn mapped<P: FieldMapped>(payload: &P) -> Self {
        Self::Fields(payload.to_wire())
    }

    /// Plain JSON object, sent as-is. Anything but an object or `null` is
    /// logged and dropped.
    pub fn json(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::Fields(fields),
            Value::Null => Self::Empty,
            other => {
                warn!(payload = %other, "payload is not a JSON object, sending none");
                Self::Empty
            }
        }
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<MultipartForm> for RequestPayload {
    fn from(form: MultipartForm) -> Self {
        Self::Multipart(form)
    }
}

/// One API call, before the token decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub base_url: String,
    pub path: String,
    pub payload: RequestPayload,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            path: path.into(),
            payload: RequestPayload::Empty,
        }
    }

    pub fn get(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, base_url, path)
    }

    pub fn post(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, base_url, path)
    }

    pub fn put(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, base_url, path)
    }

    pub fn delete(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, base_url, path)
    }

    #[must_use]
    pub fn with_payload(mut self, payload: RequestPayload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_mapped<P: FieldMapped>(self, payload: &P) -> Self {
        self.with_payload(RequestPayload::mapped(payload))
    }

    /// Final URL, query string included for GET and DELETE.
    pub fn url(&self) -> String {
        let mut url = join_url(&self.base_url, &self.path);
        if self.method.uses_query() {
            if let RequestPayload::Fields(fields) = &self.payload {
                append_query(&mut url, fields);
            }
        }
        url
    }

    /// Build the HTTP request, attaching `token` as the app-check header
    /// when given.
    pub fn build(&self, token: Option<&str>) -> HttpRequest {
        let mut headers = Vec::new();
        let body = if self.method.uses_query() {
            if let RequestPayload::Multipart(_) = &self.payload {
                warn!(method = %self.method, path = %self.path, "multipart payload ignored for a query method");
            }
            HttpBody::Empty
        } else {
            match &self.payload {
                RequestPayload::Multipart(form) => HttpBody::Multipart(form.clone()),
                RequestPayload::Fields(fields) => {
                    headers.push(json_content_type());
                    HttpBody::Json(Value::Object(fields.clone()).to_string())
                }
                RequestPayload::Empty => {
                    headers.push(json_content_type());
                    HttpBody::Empty
                }
            }
        };
        if let Some(token) = token {
            headers.push((APP_CHECK_HEADER.to_string(), token.to_string()));
        }
        HttpRequest {
            method: self.method,
            url: self.url(),
            headers,
            body,
        }
    }
}

fn json_content_type() -> (String, String) {
    (CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string())
}

/// Join with exactly one slash between base and path, and end the path with
/// a slash. A query already present on `path` is kept after that slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };
    let mut url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    if !url.ends_with('/') {
        url.push('/');
    }
    if let Some(query) = query.filter(|query| !query.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Form-encode `fields` in their insertion order, skipping `null`s. Strings
/// are written raw, any other value as its JSON text.
pub fn query_string(fields: &Map<String, Value>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::String(text) => {
                serializer.append_pair(key, text);
            }
            other => {
                serializer.append_pair(key, &other.to_string());
            }
        }
    }
    serializer.finish()
}

fn append_query(url: &mut String, fields: &Map<String, Value>) {
    let query = query_string(fields);
    if query.is_empty() {
        return;
    }
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&query);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Field, FieldMapping};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    const BASE_URL: &str = "https://api.example.com";

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct QueryPayload {
        #[serde(skip_serializing_if = "Field::is_undefined")]
        a: Field<i64>,
        #[serde(skip_serializing_if = "Field::is_undefined")]
        b: Field<i64>,
        #[serde(skip_serializing_if = "Field::is_undefined")]
        c: Field<i64>,
    }

    impl FieldMapped for QueryPayload {
        fn field_mapping() -> FieldMapping {
            FieldMapping::new(&[("a", "a"), ("b", "b"), ("c", "c")])
        }
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(fields) => fields,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn join_url_collapses_and_adds_slashes() {
        assert_eq!(join_url(BASE_URL, "crag/list"), "https://api.example.com/crag/list/");
        assert_eq!(join_url("https://api.example.com/", "/crag/list/"), "https://api.example.com/crag/list/");
        assert_eq!(join_url("https://api.example.com//", "//crag"), "https://api.example.com/crag/");
        assert_eq!(join_url(BASE_URL, ""), "https://api.example.com/");
    }

    #[test]
    fn join_url_keeps_an_inline_query() {
        assert_eq!(
            join_url(BASE_URL, "crag/get_crag_info?crag_id=X"),
            "https://api.example.com/crag/get_crag_info/?crag_id=X"
        );
    }

    #[test]
    fn get_query_omits_undefined_and_null() {
        let payload = QueryPayload {
            a: Field::Set(1),
            b: Field::Undefined,
            c: Field::Null,
        };
        let request = ApiRequest::get(BASE_URL, "route/search").with_mapped(&payload);
        assert_eq!(request.url(), "https://api.example.com/route/search/?a=1");
    }

    #[test]
    fn query_string_encodes_reserved_characters() {
        let query = query_string(&fields(json!({"q": "Dairy Farm & Co", "page": 2, "tags": ["a"]})));
        assert_eq!(query, "q=Dairy+Farm+%26+Co&page=2&tags=%5B%22a%22%5D");
    }

    #[test]
    fn query_appends_to_an_inline_query() {
        let request = ApiRequest::get(BASE_URL, "search?type=crag")
            .with_payload(RequestPayload::json(json!({"q": "df"})));
        assert_eq!(request.url(), "https://api.example.com/search/?type=crag&q=df");
    }

    #[test]
    fn empty_query_adds_no_question_mark() {
        let request = ApiRequest::get(BASE_URL, "crag/list")
            .with_payload(RequestPayload::json(json!({"only": null})));
        assert_eq!(request.url(), "https://api.example.com/crag/list/");
    }

    #[test]
    fn delete_sends_payload_as_query_without_body() {
        let request = ApiRequest::delete(BASE_URL, "post/delete")
            .with_payload(RequestPayload::json(json!({"post_id": "P1"})));
        let http = request.build(None);
        assert_eq!(http.url, "https://api.example.com/post/delete/?post_id=P1");
        assert_eq!(http.body, HttpBody::Empty);
        assert!(http.headers.is_empty());
    }

    #[test]
    fn post_json_sets_content_type_and_body() {
        let request = ApiRequest::post(BASE_URL, "post/create")
            .with_payload(RequestPayload::json(json!({"content": "Sent it", "tags": null})));
        let http = request.build(None);
        assert_eq!(http.header("content-type"), Some(JSON_CONTENT_TYPE));
        let HttpBody::Json(body) = &http.body else {
            panic!("expected JSON body");
        };
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body, json!({"content": "Sent it", "tags": null}));
    }

    #[test]
    fn multipart_passes_through_without_content_type() {
        let form = MultipartForm::new().text("route_id", "42");
        let request = ApiRequest::put(BASE_URL, "model/upload").with_payload(form.clone().into());
        let http = request.build(Some("token-abc"));
        assert_eq!(http.body, HttpBody::Multipart(form));
        assert_eq!(http.header(CONTENT_TYPE_HEADER), None);
        assert_eq!(http.header(APP_CHECK_HEADER), Some("token-abc"));
    }

    #[test]
    fn token_header_only_when_given() {
        let request = ApiRequest::get(BASE_URL, "crag/list");
        assert_eq!(request.build(None).header(APP_CHECK_HEADER), None);
        assert_eq!(request.build(Some("t")).header(APP_CHECK_HEADER), Some("t"));
    }

    #[test]
    fn mapped_post_body_keeps_declaration_order() {
        let payload = QueryPayload {
            a: Field::Set(1),
            b: Field::Set(2),
            c: Field::Set(3),
        };
        let http = ApiRequest::post(BASE_URL, "route/search").with_mapped(&payload).build(None);
        assert_eq!(http.body, HttpBody::Json(r#"{"a":1,"b":2,"c":3}"#.to_string()));
    }

    #[test]
    fn non_object_json_payload_is_dropped() {
        assert!(RequestPayload::json(json!([1, 2])).is_empty());
        assert!(RequestPayload::json(Value::Null).is_empty());
    }
}
