pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod media;
pub mod password;
pub mod rate_limit;

use api::create_api_router;
use axum::{Json, Router, routing::get};
use db::Database;
use jwt::{JwtConfig, TokenSettings};
use media::{MediaState, ObjectStore, create_media_router};
use rate_limit::{RateLimitConfig, RateLimitSettings};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Prefix under which both services mount their API.
pub const API_PREFIX: &str = "/api/v1";

pub const AUTH_SERVICE_NAME: &str = "auth-service";
pub const MEDIA_SERVICE_NAME: &str = "media-service";

pub struct AuthServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret and token lifetimes
    pub tokens: TokenSettings,
    /// Per-IP quotas for login and registration
    pub rate_limits: RateLimitSettings,
}

pub struct MediaServerConfig {
    pub store: Arc<dyn ObjectStore>,
    /// Largest accepted upload, in bytes
    pub max_file_size: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

fn health_router(service: &'static str) -> Router {
    Router::new().route(
        "/health",
        get(move || async move {
            Json(HealthResponse {
                status: "ok",
                service,
            })
        }),
    )
}

/// Create the auth service router with the given configuration.
pub fn create_auth_app(config: &AuthServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.tokens));
    let rate_limit_config = Arc::new(RateLimitConfig::new(&config.rate_limits));

    let api_router = create_api_router(config.db.clone(), jwt, rate_limit_config);

    Router::new()
        .nest(API_PREFIX, api_router)
        .merge(health_router(AUTH_SERVICE_NAME))
}

/// Create the media service router with the given configuration.
pub fn create_media_app(config: &MediaServerConfig) -> Router {
    let state = MediaState {
        store: config.store.clone(),
        max_file_size: config.max_file_size,
    };

    Router::new()
        .nest(API_PREFIX, create_media_router(state))
        .merge(health_router(MEDIA_SERVICE_NAME))
}

/// Serve `app` on the given listener until the server exits.
/// Peer addresses are recorded for per-IP rate limiting.
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), std::io::Error> {
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
