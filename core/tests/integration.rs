//! Dispatch against the live mock backend.
//!
//! # Design
//! Starts the mock server on a random port and drives the resilient
//! dispatcher over real HTTP with `ReqwestTransport`. The server's request
//! journal tells how many attempts reached it and which carried the token.

use std::sync::Arc;

use goclimb_api::{
    ApiRequest, ApiResponse, BaseEnvelope, CragModel, DataEnvelope, Dispatcher, FallbackPolicy, MultipartForm,
    NoToken, PostModel, ReqwestTransport, RequestPayload, ResilientDispatcher, StaticToken, TokenProvider,
};
use mock_server::{AppState, ACCEPTED_TOKEN, SEEDED_CRAG_ID};
use serde_json::{json, Value};

async fn start_server() -> (String, AppState) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::default();
    tokio::spawn(mock_server::run_with_state(listener, state.clone()));
    (format!("http://{addr}"), state)
}

fn resilient(tokens: impl TokenProvider + 'static, policy: FallbackPolicy) -> ResilientDispatcher {
    let dispatcher = Dispatcher::new(Arc::new(ReqwestTransport::new()), Arc::new(tokens));
    ResilientDispatcher::new(dispatcher, policy)
}

#[tokio::test]
async fn crag_info_with_valid_token() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new(ACCEPTED_TOKEN), FallbackPolicy::AllMethods);

    let outcome = api
        .make_request_detailed::<DataEnvelope<CragModel>>(
            &ApiRequest::get(&base_url, "crag/get_crag_info")
                .with_payload(RequestPayload::json(json!({"crag_id": SEEDED_CRAG_ID}))),
        )
        .await;

    assert!(outcome.ok);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.envelope.status(), 200);
    assert!(outcome.envelope.success());
    let crag = outcome.envelope.data.unwrap();
    assert_eq!(crag.name.as_deref(), Some("Test Crag"));
    assert_eq!(crag.crag_id.as_deref(), Some(SEEDED_CRAG_ID));

    let hits = state.hits_for("/crag/get_crag_info/").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].query.as_deref(), Some("crag_id=CRAG-000007"));
    assert_eq!(hits[0].app_check.as_deref(), Some(ACCEPTED_TOKEN));
}

#[tokio::test]
async fn rejected_token_falls_back_once() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new("stale-token"), FallbackPolicy::AllMethods);

    let outcome = api
        .make_request_detailed::<DataEnvelope<Vec<CragModel>>>(&ApiRequest::get(&base_url, "crag/list"))
        .await;

    assert!(outcome.ok);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.envelope.data.unwrap().len(), 1);

    let hits = state.hits_for("/crag/list/").await;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].app_check.as_deref(), Some("stale-token"));
    assert_eq!(hits[1].app_check, None);
}

#[tokio::test]
async fn forbidden_twice_returns_the_fallback_reply() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new("stale-token"), FallbackPolicy::AllMethods);

    let envelope: BaseEnvelope = api
        .get(&base_url, "auth/strict", RequestPayload::Empty)
        .await;

    assert_eq!(envelope.status, 403);
    assert!(!envelope.success);
    assert_eq!(envelope.message.as_deref(), Some("App Check token required"));
    assert_eq!(state.hits_for("/auth/strict/").await.len(), 2);
}

#[tokio::test]
async fn missing_token_provider_still_reaches_the_backend() {
    let (base_url, state) = start_server().await;
    let api = resilient(NoToken, FallbackPolicy::AllMethods);

    let outcome = api
        .make_request_detailed::<BaseEnvelope>(&ApiRequest::get(&base_url, "crag/list"))
        .await;

    assert!(outcome.ok);
    assert_eq!(outcome.attempts, 2);
    let hits = state.hits().await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].app_check, None);
}

#[tokio::test]
async fn idempotent_only_does_not_repeat_a_post() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new("stale-token"), FallbackPolicy::IdempotentOnly);

    let envelope: BaseEnvelope = api
        .post(&base_url, "post/create", RequestPayload::json(json!({"content": "Sent it"})))
        .await;

    assert_eq!(envelope.status, 403);
    assert_eq!(state.hits_for("/post/create/").await.len(), 1);
}

#[tokio::test]
async fn idempotent_only_repeats_a_forbidden_delete() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new("stale-token"), FallbackPolicy::IdempotentOnly);

    let envelope: BaseEnvelope = api
        .delete(&base_url, "post/delete", RequestPayload::json(json!({"post_id": "missing"})))
        .await;

    assert_eq!(envelope.status, 404);
    assert_eq!(envelope.message.as_deref(), Some("Post not found"));
    let hits = state.hits_for("/post/delete/").await;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[1].app_check, None);
}

#[tokio::test]
async fn create_post_decodes_nested_user_and_date() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new(ACCEPTED_TOKEN), FallbackPolicy::AllMethods);

    let outcome = api
        .make_request_detailed::<DataEnvelope<PostModel>>(
            &ApiRequest::post(&base_url, "/post/create/")
                .with_payload(RequestPayload::json(json!({"content": "Sent it", "tags": ["v4"]}))),
        )
        .await;

    assert!(outcome.ok);
    assert_eq!(outcome.envelope.status(), 201);
    let post = outcome.envelope.data.unwrap();
    assert_eq!(post.content.as_deref(), Some("Sent it"));
    assert_eq!(post.tags, vec!["v4".to_string()]);
    assert_eq!(post.user.unwrap().full_name.as_deref(), Some("Demo Climber"));
    assert!(post.created_at_utc.is_some());

    let hits = state.hits_for("/post/create/").await;
    assert_eq!(hits[0].content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn blank_post_is_ok_but_not_successful() {
    let (base_url, _state) = start_server().await;
    let api = resilient(StaticToken::new(ACCEPTED_TOKEN), FallbackPolicy::AllMethods);

    let outcome = api
        .make_request_detailed::<BaseEnvelope>(
            &ApiRequest::post(&base_url, "post/create").with_payload(RequestPayload::json(json!({"content": ""}))),
        )
        .await;

    assert!(outcome.ok);
    assert!(!outcome.envelope.success);
    assert_eq!(
        outcome.envelope.errors,
        Some(json!({"content": ["This field may not be blank."]}))
    );
}

#[tokio::test]
async fn missing_query_field_returns_400_without_retry() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new(ACCEPTED_TOKEN), FallbackPolicy::AllMethods);

    let outcome = api
        .make_request_detailed::<DataEnvelope<CragModel>>(&ApiRequest::get(&base_url, "crag/get_crag_info"))
        .await;

    assert!(!outcome.ok);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.envelope.status(), 400);
    assert_eq!(outcome.envelope.data, None);
    assert_eq!(
        outcome.envelope.errors(),
        Some(&json!({"crag_id": ["This field is required."]}))
    );
    assert_eq!(state.hits().await.len(), 1);
}

#[tokio::test]
async fn server_error_is_returned_as_is() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new(ACCEPTED_TOKEN), FallbackPolicy::AllMethods);

    let envelope: BaseEnvelope = api
        .get(&base_url, "debug/server_error", RequestPayload::Empty)
        .await;

    assert_eq!(envelope.status, 500);
    assert_eq!(envelope.message.as_deref(), Some("boom"));
    assert_eq!(state.hits().await.len(), 1);
}

#[tokio::test]
async fn non_json_body_keeps_the_status() {
    let (base_url, _state) = start_server().await;
    let dispatcher = Dispatcher::new(
        Arc::new(ReqwestTransport::new()),
        Arc::new(StaticToken::new(ACCEPTED_TOKEN)),
    );

    let dispatched = dispatcher
        .send::<DataEnvelope<Value>>(&ApiRequest::get(&base_url, "debug/not_json"), true)
        .await
        .unwrap();

    assert!(dispatched.ok);
    assert_eq!(dispatched.status(), 200);
    assert!(dispatched.json.is_none());
    assert_eq!(dispatched.raw, "not json");
    assert!(!dispatched.envelope.success());
}

#[tokio::test]
async fn multipart_upload_reaches_the_backend() {
    let (base_url, state) = start_server().await;
    let api = resilient(StaticToken::new(ACCEPTED_TOKEN), FallbackPolicy::AllMethods);
    let form = MultipartForm::new()
        .text("crag_id", SEEDED_CRAG_ID)
        .file("model", "wall.glb", Some("model/gltf-binary"), b"glTF".to_vec());

    let outcome = api
        .make_request_detailed::<DataEnvelope<Value>>(
            &ApiRequest::post(&base_url, "model/upload").with_payload(form.into()),
        )
        .await;

    assert!(outcome.ok);
    let data = outcome.envelope.data.unwrap();
    assert_eq!(data["fields"], json!(["crag_id"]));
    assert_eq!(data["files"][0]["file_name"], "wall.glb");
    assert_eq!(data["files"][0]["size"], 4);

    let hits = state.hits_for("/model/upload/").await;
    assert!(hits[0]
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("multipart/form-data; boundary="));
}

#[tokio::test]
async fn unreachable_backend_yields_a_network_failure_envelope() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = resilient(StaticToken::new(ACCEPTED_TOKEN), FallbackPolicy::AllMethods);
    let outcome = api
        .make_request_detailed::<BaseEnvelope>(&ApiRequest::get(format!("http://{addr}"), "crag/list"))
        .await;

    assert_eq!(outcome.attempts, 1);
    assert!(!outcome.ok);
    assert_eq!(outcome.envelope.status, 0);
    assert!(outcome.envelope.message.unwrap().starts_with("Network error: "));
}
