use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use libhub::media::{MemoryStore, ObjectStore};
use libhub::{MediaServerConfig, create_media_app};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";
const BASE_URL: &str = "http://media.test/media";

struct Part<'a> {
    field: &'a str,
    filename: &'a str,
    content_type: Option<&'a str>,
    data: &'a [u8],
}

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field, part.filename
            )
            .as_bytes(),
        );
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn create_test_app(max_file_size: usize) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(BASE_URL));
    let config = MediaServerConfig {
        store: store.clone(),
        max_file_size,
    };
    (create_media_app(&config), store)
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn upload(app: &Router, filename: &str, content_type: &str, data: &[u8]) -> Value {
    let (status, body) = send_json(
        app,
        multipart_request(
            "/api/v1/upload",
            &[Part {
                field: "file",
                filename,
                content_type: Some(content_type),
                data,
            }],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {}", body);
    body
}

#[tokio::test]
async fn test_health() {
    let (app, _store) = create_test_app(1024);

    let (status, body) = send_json(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "media-service");
}

#[tokio::test]
async fn test_upload_file() {
    let (app, store) = create_test_app(1024);

    let body = upload(&app, "cover.png", "image/png", b"PNGDATA").await;

    assert_eq!(body["message"], "File uploaded successfully");
    assert_eq!(body["original_name"], "cover.png");
    assert_eq!(body["size"], 7);

    let filename = body["filename"].as_str().unwrap();
    assert!(filename.ends_with(".png"));
    assert_eq!(filename.len(), 36 + 4);
    assert_eq!(body["url"], format!("{}/{}", BASE_URL, filename));

    let info = store.stat(filename).await.unwrap();
    assert_eq!(info.size, 7);
    assert_eq!(info.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn test_upload_default_content_type() {
    let (app, store) = create_test_app(1024);

    let (status, body) = send_json(
        &app,
        multipart_request(
            "/api/v1/upload",
            &[Part {
                field: "file",
                filename: "blob",
                content_type: None,
                data: b"raw",
            }],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let info = store.stat(body["filename"].as_str().unwrap()).await.unwrap();
    assert_eq!(info.content_type.as_deref(), Some("application/octet-stream"));
}

#[tokio::test]
async fn test_upload_missing_file_field() {
    let (app, store) = create_test_app(1024);

    let (status, body) = send_json(
        &app,
        multipart_request(
            "/api/v1/upload",
            &[Part {
                field: "other",
                filename: "a.txt",
                content_type: Some("text/plain"),
                data: b"x",
            }],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_upload_too_large() {
    let (app, store) = create_test_app(16);

    let (status, body) = send_json(
        &app,
        multipart_request(
            "/api/v1/upload",
            &[Part {
                field: "file",
                filename: "big.bin",
                content_type: Some("application/octet-stream"),
                data: &[0u8; 32],
            }],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("File too large"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_upload_multiple() {
    let (app, store) = create_test_app(16);

    let (status, body) = send_json(
        &app,
        multipart_request(
            "/api/v1/upload/multiple",
            &[
                Part {
                    field: "files",
                    filename: "a.txt",
                    content_type: Some("text/plain"),
                    data: b"first",
                },
                Part {
                    field: "files",
                    filename: "big.bin",
                    content_type: None,
                    data: &[1u8; 64],
                },
                Part {
                    field: "files",
                    filename: "b.txt",
                    content_type: Some("text/plain"),
                    data: b"second",
                },
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Upload completed");

    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(files[0]["success"], true);
    assert_eq!(files[0]["original_name"], "a.txt");
    assert_eq!(files[1]["success"], false);
    assert_eq!(files[1]["filename"], "big.bin");
    assert_eq!(files[1]["error"], "File too large");
    assert_eq!(files[2]["success"], true);
    assert_eq!(files[2]["size"], 6);

    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_upload_multiple_requires_files() {
    let (app, _store) = create_test_app(1024);

    let (status, body) = send_json(&app, multipart_request("/api/v1/upload/multiple", &[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No files provided");
}

#[tokio::test]
async fn test_get_and_download_file() {
    let (app, _store) = create_test_app(1024);
    let body = upload(&app, "notes.txt", "text/plain", b"hello world").await;
    let filename = body["filename"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/file/{}", filename)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
    assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"hello world");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/download/{}", filename)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename={}", filename).as_str()
    );
}

#[tokio::test]
async fn test_get_missing_file() {
    let (app, _store) = create_test_app(1024);

    for uri in [
        "/api/v1/file/missing.txt",
        "/api/v1/download/missing.txt",
        "/api/v1/info/missing.txt",
        "/api/v1/thumbnail/missing.png",
        "/api/v1/presign/missing.txt",
    ] {
        let (status, body) = send_json(&app, get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri {}", uri);
        assert_eq!(body["error"], "File not found");
    }
}

#[tokio::test]
async fn test_thumbnail() {
    let (app, _store) = create_test_app(1024);
    let image = upload(&app, "photo.JPG", "image/jpeg", b"JPEG").await;
    let document = upload(&app, "report.pdf", "application/pdf", b"PDF").await;

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/v1/thumbnail/{}",
            image["filename"].as_str().unwrap()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

    let (status, body) = send_json(
        &app,
        get(&format!(
            "/api/v1/thumbnail/{}",
            document["filename"].as_str().unwrap()
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File is not an image");
}

#[tokio::test]
async fn test_file_info() {
    let (app, _store) = create_test_app(1024);
    let uploaded = upload(&app, "a.txt", "text/plain", b"abc").await;
    let filename = uploaded["filename"].as_str().unwrap();

    let (status, body) = send_json(&app, get(&format!("/api/v1/info/{}", filename))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], filename);
    assert_eq!(body["size"], 3);
    assert_eq!(body["content_type"], "text/plain");
    assert!(body["last_modified"].as_str().is_some());
    assert!(body["etag"].as_str().is_some());
    assert_eq!(body["url"], uploaded["url"]);
}

#[tokio::test]
async fn test_list_files_with_prefix() {
    let (app, store) = create_test_app(1024);
    store
        .put("covers/1.png", "one".into(), "image/png")
        .await
        .unwrap();
    store
        .put("covers/2.png", "two".into(), "image/png")
        .await
        .unwrap();
    store
        .put("scans/1.pdf", "three".into(), "application/pdf")
        .await
        .unwrap();

    let (status, body) = send_json(&app, get("/api/v1/files?prefix=covers/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["files"][0]["name"], "covers/1.png");
    assert_eq!(body["files"][1]["size"], 3);

    let (_, body) = send_json(&app, get("/api/v1/files")).await;
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_delete_file() {
    let (app, store) = create_test_app(1024);
    let uploaded = upload(&app, "a.txt", "text/plain", b"abc").await;
    let filename = uploaded["filename"].as_str().unwrap();

    let (status, body) = send_json(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/file/{}", filename))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "File deleted successfully");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_presign() {
    let (app, _store) = create_test_app(1024);
    let uploaded = upload(&app, "a.txt", "text/plain", b"abc").await;
    let filename = uploaded["filename"].as_str().unwrap();

    let (status, body) = send_json(&app, get(&format!("/api/v1/presign/{}", filename))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().contains(filename));
    assert!(body["url"].as_str().unwrap().contains("expires_in=3600"));
    assert!(body["expires"].as_u64().is_some());

    let (status, body) = send_json(
        &app,
        get(&format!("/api/v1/presign/{}?expiry=60", filename)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().contains("expires_in=60"));

    for expiry in ["0", "604801"] {
        let (status, _) = send_json(
            &app,
            get(&format!("/api/v1/presign/{}?expiry={}", filename, expiry)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_presign_deleted_file() {
    let (app, _store) = create_test_app(1024);
    let uploaded = upload(&app, "a.txt", "text/plain", b"abc").await;
    let filename = uploaded["filename"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/file/{}", filename))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = send_json(&app, get(&format!("/api/v1/presign/{}", filename))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");
}
