#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use tracker::config::{Config, StoreBackend};
use tracker::store::memory::MemoryStore;
use tracker::store::{AppState, IssueStore, UserStore};

pub const ADMIN_PASSWORD: &str = "testpassword";
pub const USER_PASSWORD: &str = "testpass123";

fn test_config(store: StoreBackend) -> Config {
    Config {
        listen: "127.0.0.1:0".into(),
        store,
        database_url: "postgres://localhost/test".into(),
        valkey_url: None,
        jwt_secret: "integration-test-secret".into(),
        token_ttl_hours: 24,
        admin_password: Some(ADMIN_PASSWORD.into()),
        cors_origins: vec![],
    }
}

/// Build a test `AppState` over the given stores.
///
/// - Bootstraps the admin user (`admin@localhost` / "testpassword")
/// - No Valkey, so login rate limiting is off
pub async fn state_with(issues: Arc<dyn IssueStore>, users: Arc<dyn UserStore>) -> AppState {
    let config = test_config(StoreBackend::Memory);
    let state = AppState::new(issues, users, None, config);

    tracker::store::bootstrap::run(&state.credentials, Some(ADMIN_PASSWORD))
        .await
        .expect("bootstrap failed");

    state
}

/// Build a test `AppState` backed by a fresh in-memory store.
pub async fn test_state() -> AppState {
    let store = Arc::new(MemoryStore::new());
    let issues: Arc<dyn IssueStore> = store.clone();
    state_with(issues, store).await
}

/// Build the full application router with the given state.
pub fn test_router(state: AppState) -> Router {
    tracker::api::app(state)
}

/// Fresh in-memory app, ready for requests.
pub async fn test_app() -> Router {
    test_router(test_state().await)
}

/// Login with email and password. Returns the bearer token.
pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = post_json(
        app,
        "",
        "/api/auth/login",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"]
        .as_str()
        .expect("login response missing token")
        .to_owned()
}

/// Login as the bootstrap admin user. Returns the bearer token.
pub async fn admin_login(app: &Router) -> String {
    login(app, "admin@localhost", ADMIN_PASSWORD).await
}

/// Sign up a user with the given role, login with them, return `(user_id, token)`.
pub async fn create_user(app: &Router, name: &str, email: &str, role: &str) -> (Uuid, String) {
    let (status, body) = post_json(
        app,
        "",
        "/api/auth/signup",
        serde_json::json!({
            "name": name,
            "email": email,
            "password": USER_PASSWORD,
            "role": role,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    let user_id = Uuid::parse_str(body["user"]["id"].as_str().unwrap()).unwrap();

    let token = login(app, email, USER_PASSWORD).await;
    (user_id, token)
}

/// Create an issue. Returns the issue id.
pub async fn create_issue(app: &Router, token: &str, title: &str) -> Uuid {
    let (status, body) = post_json(
        app,
        token,
        "/api/issues",
        serde_json::json!({
            "title": title,
            "description": format!("{title} description"),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create issue failed: {body}");
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

/// Send a GET request with Bearer auth.
pub async fn get_json(app: &Router, token: &str, path: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(path);
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty()).unwrap();

    send(app, req).await
}

/// Send a POST request with Bearer auth and JSON body.
pub async fn post_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "POST", token, path, body).await
}

/// Send a PUT request with Bearer auth and JSON body.
pub async fn put_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "PUT", token, path, body).await
}

async fn send_json(
    app: &Router,
    method: &str,
    token: &str,
    path: &str,
    body: Value,
) -> (StatusCode, Value) {
    send_raw(app, method, token, path, serde_json::to_string(&body).unwrap()).await
}

/// Send an arbitrary (possibly malformed) body labelled as JSON.
pub async fn send_raw(
    app: &Router,
    method: &str,
    token: &str,
    path: &str,
    body: impl Into<String>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("Content-Type", "application/json");
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::from(body.into())).unwrap();

    send(app, req).await
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;

    if status.is_client_error() || status.is_server_error() {
        assert!(
            body["error"].is_string(),
            "{status} response without an error body: {body}"
        );
    }
    (status, body)
}

/// Extract JSON body from a response. Panics on a non-JSON body so plain-text
/// rejections cannot slip through as `Null`.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        panic!(
            "response body is not JSON ({e}): {}",
            String::from_utf8_lossy(&bytes)
        )
    })
}
