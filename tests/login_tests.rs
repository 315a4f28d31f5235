mod common;

use axum::http::StatusCode;
use common::{create_test_app, json_request, register, send};
use serde_json::json;

async fn login(app: &axum::Router, username: &str, password: &str) -> (StatusCode, serde_json::Value) {
    send(
        app,
        json_request(
            "POST",
            "/api/v1/login",
            json!({"username": username, "password": password}),
            None,
        ),
    )
    .await
}

#[tokio::test]
async fn test_login_with_username() {
    let (app, _db) = create_test_app().await;
    register(&app, "alice", "alice@example.com", "password123").await;

    let (status, body) = login(&app, "alice", "password123").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["tokens"]["access_token"].as_str().is_some());
    assert!(body["tokens"]["refresh_token"].as_str().is_some());
    assert_eq!(body["tokens"]["token_type"], "Bearer");
}

#[tokio::test]
async fn test_login_with_email() {
    let (app, _db) = create_test_app().await;
    register(&app, "alice", "alice@example.com", "password123").await;

    let (status, body) = login(&app, "alice@example.com", "password123").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (app, _db) = create_test_app().await;
    register(&app, "alice", "alice@example.com", "password123").await;

    let (status, body) = login(&app, "alice", "wrong-password").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_unknown_user() {
    let (app, _db) = create_test_app().await;

    let (status, body) = login(&app, "nobody", "password123").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_inactive_user() {
    let (app, db) = create_test_app().await;
    let body = register(&app, "alice", "alice@example.com", "password123").await;
    let id = body["user"]["id"].as_i64().unwrap();
    db.users().set_active(id, false).await.unwrap();

    let (status, body) = login(&app, "alice", "password123").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "User is inactive");

    // The password is checked first, so a wrong one still reads as bad credentials
    let (status, _) = login(&app, "alice", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_missing_field() {
    let (app, _db) = create_test_app().await;

    let (status, _) = send(
        &app,
        json_request("POST", "/api/v1/login", json!({"username": "alice"}), None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
