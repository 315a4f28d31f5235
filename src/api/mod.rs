//! Auth service HTTP API: sessions, profile and user administration.

mod admin;
mod error;
mod profile;
mod session;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub(crate) use error::ApiError;
pub use error::{MAX_USERNAME_LEN, MIN_PASSWORD_LEN};
pub(crate) use error::{validate_email, validate_password, validate_username};

/// Create the auth API router, mounted under `/api/v1`.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let session_state = session::SessionState {
        db: db.clone(),
        jwt: jwt.clone(),
        rate_limit_config,
    };

    let profile_state = profile::ProfileState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let admin_state = admin::AdminState { db, jwt };

    Router::new()
        .merge(session::router(session_state))
        .merge(profile::router(profile_state))
        .nest("/admin", admin::router(admin_state))
}
