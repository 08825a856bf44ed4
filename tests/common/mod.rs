//! In-process fake of the processing platform
//!
//! Serves the login, container, upload and component endpoints with the
//! platform's response envelope and records every request it sees.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tao_publisher::ApiClient;
use tao_publisher::core::RetryOptions;
use tao_publisher::security::SessionManager;

pub const TOKEN: &str = "tok-1";
pub const USER: &str = "alice";
pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
pub struct Upload {
    pub container_id: String,
    pub kind: String,
    pub content_type: String,
    pub body: String,
}

#[derive(Default)]
pub struct Platform {
    calls: Mutex<Vec<String>>,
    pub containers: Mutex<Vec<Value>>,
    pub components: Mutex<Vec<Value>>,
    pub uploads: Mutex<Vec<Upload>>,
    /// Answer listings with an HTML error page
    pub garbage: AtomicBool,
}

impl Platform {
    /// Platform already holding components `item-0` .. `item-{count-1}`
    pub fn with_components(count: usize) -> Self {
        let platform = Self::default();
        {
            let mut components = platform.components.lock().unwrap();
            for i in 0..count {
                components.push(json!({"id": format!("item-{}", i), "label": format!("Item {}", i)}));
            }
        }
        platform
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn collection(&self, kind: &str) -> &Mutex<Vec<Value>> {
        match kind {
            "container" => &self.containers,
            _ => &self.components,
        }
    }
}

type Shared = Arc<Platform>;
type Reply = (StatusCode, Json<Value>);

fn ok(data: Value) -> Reply {
    (StatusCode::OK, Json(json!({"status": "SUCCEEDED", "data": data})))
}

fn failed(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({"status": "FAILED", "message": message})))
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("X-Auth-Token").and_then(|v| v.to_str().ok()) == Some(TOKEN)
}

async fn login(State(platform): State<Shared>, Json(body): Json<Value>) -> Reply {
    platform.record("POST /login".to_string());
    if body["username"] == USER && body["password"] == PASSWORD {
        ok(json!({"token": TOKEN, "expiresAt": "2099-01-01T00:00:00Z"}))
    } else {
        failed(StatusCode::UNAUTHORIZED, "Invalid credentials")
    }
}

async fn create_container(
    State(platform): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    platform.record("POST /container".to_string());
    if !authorized(&headers) {
        return failed(StatusCode::UNAUTHORIZED, "Invalid token");
    }

    let mut containers = platform.containers.lock().unwrap();
    let mut record = body;
    record["id"] = json!(format!("c-{}", containers.len() + 1));
    containers.push(record.clone());
    ok(record)
}

fn upload(platform: &Platform, id: String, kind: &str, headers: &HeaderMap, body: &Bytes) -> Reply {
    platform.record(format!("POST /container/{}/{}", id, kind));
    if !authorized(headers) {
        return failed(StatusCode::UNAUTHORIZED, "Invalid token");
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("multipart/form-data") {
        return failed(StatusCode::BAD_REQUEST, "expected a multipart body");
    }
    if !platform.containers.lock().unwrap().iter().any(|c| c["id"] == id) {
        return failed(StatusCode::NOT_FOUND, "Unknown container");
    }

    platform.uploads.lock().unwrap().push(Upload {
        container_id: id,
        kind: kind.to_string(),
        content_type,
        body: String::from_utf8_lossy(body).into_owned(),
    });
    ok(Value::Null)
}

async fn upload_logo(
    State(platform): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    upload(&platform, id, "logo", &headers, &body)
}

async fn upload_application(
    State(platform): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    upload(&platform, id, "application", &headers, &body)
}

async fn create_component(
    State(platform): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    platform.record(format!("POST /component {}", body["id"].as_str().unwrap_or("?")));
    if !authorized(&headers) {
        return failed(StatusCode::UNAUTHORIZED, "Invalid token");
    }

    let container_id = body["containerId"].clone();
    if !platform.containers.lock().unwrap().iter().any(|c| c["id"] == container_id) {
        return failed(StatusCode::NOT_FOUND, "Unknown container");
    }

    let mut components = platform.components.lock().unwrap();
    if components.iter().any(|c| c["id"] == body["id"]) {
        let message = format!(
            "Component '{}' already exists",
            body["id"].as_str().unwrap_or_default()
        );
        return failed(StatusCode::CONFLICT, &message);
    }
    components.push(body.clone());
    ok(body)
}

async fn list_components(
    State(platform): State<Shared>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    platform.record(match &raw {
        Some(raw) => format!("GET /component?{}", raw),
        None => "GET /component".to_string(),
    });

    if platform.garbage.load(Ordering::SeqCst) {
        return (StatusCode::BAD_GATEWAY, "<html>upstream error</html>".to_string());
    }
    if !authorized(&headers) {
        let (status, Json(body)) = failed(StatusCode::UNAUTHORIZED, "Invalid token");
        return (status, body.to_string());
    }

    let components = platform.components.lock().unwrap();
    let total = components.len();
    let page: Vec<Value> = match (query.get("page"), query.get("pageSize")) {
        (Some(page), Some(size)) => {
            let page: usize = page.parse().unwrap();
            let size: usize = size.parse().unwrap();
            components.iter().skip(page * size).take(size).cloned().collect()
        }
        _ => components.clone(),
    };

    let body = json!({"status": "SUCCEEDED", "data": page, "totalCount": total});
    (StatusCode::OK, body.to_string())
}

fn get_one(platform: &Platform, kind: &str, id: String, headers: &HeaderMap) -> Reply {
    platform.record(format!("GET /{}/{}", kind, id));
    if !authorized(headers) {
        return failed(StatusCode::UNAUTHORIZED, "Invalid token");
    }

    let found = platform
        .collection(kind)
        .lock()
        .unwrap()
        .iter()
        .find(|r| r["id"] == id)
        .cloned();
    match found {
        Some(record) => ok(record),
        None => failed(StatusCode::NOT_FOUND, &format!("No {} with id '{}'", kind, id)),
    }
}

fn delete_one(platform: &Platform, kind: &str, id: String, headers: &HeaderMap) -> Reply {
    platform.record(format!("DELETE /{}/{}", kind, id));
    if !authorized(headers) {
        return failed(StatusCode::UNAUTHORIZED, "Invalid token");
    }

    let mut items = platform.collection(kind).lock().unwrap();
    let before = items.len();
    items.retain(|r| r["id"] != id);
    if items.len() == before {
        return failed(StatusCode::NOT_FOUND, &format!("No {} with id '{}'", kind, id));
    }
    ok(Value::Null)
}

async fn get_container(
    State(platform): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Reply {
    get_one(&platform, "container", id, &headers)
}

async fn delete_container(
    State(platform): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Reply {
    delete_one(&platform, "container", id, &headers)
}

async fn get_component(
    State(platform): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Reply {
    get_one(&platform, "component", id, &headers)
}

async fn delete_component(
    State(platform): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Reply {
    delete_one(&platform, "component", id, &headers)
}

/// Start the fake platform on an ephemeral port; returns its base URL
pub async fn start(platform: Arc<Platform>) -> String {
    let app = Router::new()
        .route("/login", post(login))
        .route("/container", post(create_container))
        .route("/container/{id}/logo", post(upload_logo))
        .route("/container/{id}/application", post(upload_application))
        .route("/container/{id}", get(get_container).delete(delete_container))
        .route("/component", post(create_component).get(list_components))
        .route("/component/{id}", get(get_component).delete(delete_component))
        .with_state(platform);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

/// Server that accepts connections and never answers
///
/// Returns its base URL and the number of connections accepted so far.
pub async fn start_silent() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(stream);
        }
    });

    (format!("http://127.0.0.1:{}", port), accepted)
}

/// Client for `base_url` with a fresh, unauthenticated session
pub fn client(base_url: &str) -> ApiClient {
    let sessions = Arc::new(SessionManager::new(chrono::Duration::hours(1)));
    ApiClient::new(base_url, Duration::from_secs(5), sessions)
        .unwrap()
        .with_retry(RetryOptions::single_attempt())
}
