use std::{collections::HashMap, sync::Arc, time::SystemTime};

use axum::{
    extract::{Multipart, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const APP_CHECK_HEADER: &str = "x-firebase-appcheck";
pub const ACCEPTED_TOKEN: &str = "valid-token";
pub const SEEDED_CRAG_ID: &str = "CRAG-000007";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Crag {
    pub crag_id: String,
    pub name: String,
    pub location_lat: f64,
    pub location_lon: f64,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub user: Value,
    pub content: String,
    pub tags: Vec<String>,
    pub image_urls: Vec<String>,
    pub status: String,
    /// Epoch milliseconds.
    pub created_at: u64,
}

#[derive(Deserialize)]
pub struct CreatePost {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct CragQuery {
    pub crag_id: Option<String>,
}

#[derive(Deserialize)]
pub struct PostQuery {
    pub post_id: Option<String>,
}

/// One request as the server saw it, kept so tests can count attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub app_check: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    accepted_token: Arc<str>,
    crags: Arc<RwLock<HashMap<String, Crag>>>,
    posts: Arc<RwLock<HashMap<String, Post>>>,
    hits: Arc<RwLock<Vec<Hit>>>,
}

impl AppState {
    pub fn new(accepted_token: &str) -> Self {
        let seeded = Crag {
            crag_id: SEEDED_CRAG_ID.to_string(),
            name: "Test Crag".to_string(),
            location_lat: 1.3644,
            location_lon: 103.7766,
            description: Some("Granite bouldering with pockets and ripples.".to_string()),
            image_urls: Vec::new(),
        };
        Self {
            accepted_token: Arc::from(accepted_token),
            crags: Arc::new(RwLock::new(HashMap::from([(seeded.crag_id.clone(), seeded)]))),
            posts: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn hits(&self) -> Vec<Hit> {
        self.hits.read().await.clone()
    }

    pub async fn hits_for(&self, path: &str) -> Vec<Hit> {
        self.hits
            .read()
            .await
            .iter()
            .filter(|hit| hit.path == path)
            .cloned()
            .collect()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ACCEPTED_TOKEN)
    }
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/crag/get_crag_info/", get(get_crag_info))
        .route("/crag/list/", get(list_crags))
        .route("/post/create/", post(create_post))
        .route("/post/delete/", delete(delete_post))
        .route("/model/upload/", post(upload_model))
        .route("/auth/strict/", get(strict_endpoint))
        .route("/debug/not_json/", get(not_json))
        .route("/debug/server_error/", get(server_error))
        .layer(middleware::from_fn_with_state(state.clone(), app_check))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

fn envelope(status: StatusCode, success: bool, message: Option<&str>, errors: Value, data: Value) -> Response {
    let body = json!({
        "success": success,
        "message": message,
        "errors": errors,
        "data": data,
    });
    (status, Json(body)).into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    envelope(status, false, Some(message), Value::Null, Value::Null)
}

/// Records the request, then rejects a token that is present but wrong.
/// A missing token is let through; routes that insist on one check again.
async fn app_check(State(state): State<AppState>, request: Request, next: Next) -> Response {
    // The request body is not `Sync`; no borrow of it may live across an await.
    let hit = {
        let header_value = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Hit {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            app_check: header_value(APP_CHECK_HEADER),
            content_type: header_value(header::CONTENT_TYPE.as_str()),
        }
    };
    tracing::debug!(method = %hit.method, path = %hit.path, token = hit.app_check.is_some(), "request");
    let rejected = hit
        .app_check
        .as_deref()
        .is_some_and(|token| token != &*state.accepted_token);
    state.hits.write().await.push(hit);

    if rejected {
        return failure(StatusCode::FORBIDDEN, "App Check token invalid");
    }
    next.run(request).await
}

async fn get_crag_info(State(state): State<AppState>, Query(query): Query<CragQuery>) -> Response {
    let Some(crag_id) = query.crag_id else {
        return envelope(
            StatusCode::BAD_REQUEST,
            false,
            Some("Invalid request"),
            json!({"crag_id": ["This field is required."]}),
            Value::Null,
        );
    };
    match state.crags.read().await.get(&crag_id) {
        Some(crag) => envelope(StatusCode::OK, true, Some("Crag found"), Value::Null, json!(crag)),
        None => failure(StatusCode::NOT_FOUND, "Crag not found"),
    }
}

async fn list_crags(State(state): State<AppState>) -> Response {
    let mut crags: Vec<Crag> = state.crags.read().await.values().cloned().collect();
    crags.sort_by(|a, b| a.crag_id.cmp(&b.crag_id));
    envelope(StatusCode::OK, true, None, Value::Null, json!(crags))
}

async fn create_post(State(state): State<AppState>, Json(input): Json<CreatePost>) -> Response {
    if input.content.trim().is_empty() {
        return envelope(
            StatusCode::OK,
            false,
            Some("Post content is empty"),
            json!({"content": ["This field may not be blank."]}),
            Value::Null,
        );
    }
    let post = Post {
        post_id: Uuid::new_v4().to_string(),
        user: json!({"user_id": "U1", "full_name": "Demo Climber", "role": "member", "status": true}),
        content: input.content,
        tags: input.tags,
        image_urls: Vec::new(),
        status: "active".to_string(),
        created_at: now_millis(),
    };
    state.posts.write().await.insert(post.post_id.clone(), post.clone());
    envelope(StatusCode::CREATED, true, Some("Post created"), Value::Null, json!(post))
}

async fn delete_post(State(state): State<AppState>, Query(query): Query<PostQuery>) -> Response {
    let removed = match query.post_id {
        Some(post_id) => state.posts.write().await.remove(&post_id),
        None => None,
    };
    match removed {
        Some(_) => envelope(StatusCode::OK, true, Some("Post deleted"), Value::Null, Value::Null),
        None => failure(StatusCode::NOT_FOUND, "Post not found"),
    }
}

async fn upload_model(mut multipart: Multipart) -> Response {
    let mut fields = Vec::new();
    let mut files = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return failure(StatusCode::BAD_REQUEST, &err.body_text()),
        };
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let size = match field.bytes().await {
                Ok(bytes) => bytes.len(),
                Err(err) => return failure(StatusCode::BAD_REQUEST, &err.body_text()),
            };
            files.push(json!({"field": name, "file_name": file_name, "size": size}));
        } else {
            fields.push(name);
        }
    }
    let data = json!({"fields": fields, "files": files});
    envelope(StatusCode::CREATED, true, Some("Model uploaded"), Value::Null, data)
}

async fn strict_endpoint(State(state): State<AppState>, request: Request) -> Response {
    let token = request
        .headers()
        .get(APP_CHECK_HEADER)
        .and_then(|value| value.to_str().ok());
    if token != Some(&*state.accepted_token) {
        return failure(StatusCode::FORBIDDEN, "App Check token required");
    }
    envelope(StatusCode::OK, true, Some("Verified"), Value::Null, Value::Null)
}

async fn not_json() -> Response {
    (StatusCode::OK, "not json").into_response()
}

async fn server_error() -> Response {
    failure(StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
