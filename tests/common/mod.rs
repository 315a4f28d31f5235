#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use libhub::db::Database;
use libhub::jwt::{JwtConfig, TokenSettings};
use libhub::rate_limit::RateLimitSettings;
use libhub::{AuthServerConfig, create_auth_app};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-that-is-at-least-32-bytes";

pub fn token_settings() -> TokenSettings {
    TokenSettings::with_secret(TEST_SECRET)
}

/// A codec sharing the test app's secret and lifetimes.
pub fn jwt() -> JwtConfig {
    JwtConfig::new(&token_settings())
}

/// Quotas high enough that tests never trip them.
pub fn relaxed_rate_limits() -> RateLimitSettings {
    RateLimitSettings {
        login_per_minute: 10_000,
        register_per_minute: 10_000,
        trust_proxy: false,
    }
}

pub async fn create_test_app_with_limits(rate_limits: RateLimitSettings) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = AuthServerConfig {
        db: db.clone(),
        tokens: token_settings(),
        rate_limits,
    };
    (create_auth_app(&config), db)
}

pub async fn create_test_app() -> (Router, Database) {
    create_test_app_with_limits(relaxed_rate_limits()).await
}

pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Send a request and decode the JSON body (Null for an empty body).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

/// Register a user and return the full response body.
pub async fn register(app: &Router, username: &str, email: &str, password: &str) -> Value {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/v1/register",
            json!({
                "username": username,
                "email": email,
                "password": password,
                "first_name": "Test",
                "last_name": "User",
            }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body
}

/// Register a user and return `(user_id, access_token)`.
pub async fn register_user(app: &Router, username: &str) -> (i64, String) {
    let body = register(app, username, &format!("{}@example.com", username), "password123").await;
    let id = body["user"]["id"].as_i64().unwrap();
    let token = body["tokens"]["access_token"].as_str().unwrap().to_string();
    (id, token)
}

/// Register a user, grant the staff flag, and return `(user_id, access_token)`.
pub async fn register_staff(app: &Router, db: &Database, username: &str) -> (i64, String) {
    let (id, token) = register_user(app, username).await;
    db.users().set_staff(id, true).await.unwrap();
    (id, token)
}
