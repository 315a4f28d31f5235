//! Registration, login and token endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{
    ApiError, ApiJson, ResultExt, validate_email, validate_password, validate_username,
};
use crate::auth::Auth;
use crate::db::{Database, NewUser, User, UserProfile, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::{JwtConfig, TokenPair};
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

#[derive(Clone)]
pub struct SessionState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(SessionState);

pub fn router(state: SessionState) -> Router {
    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_register,
        ));

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let token_router = Router::new()
        .route("/refresh", post(refresh))
        .route("/validate", post(validate))
        .route("/logout", post(logout))
        .with_state(state);

    Router::new()
        .merge(register_router)
        .merge(login_router)
        .merge(token_router)
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    /// Username or email
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct AuthResponse {
    user: UserProfile,
    tokens: TokenPair,
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: u64,
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    user_id: i64,
    username: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

fn issue_tokens(jwt: &JwtConfig, user: &User) -> Result<AuthResponse, ApiError> {
    let tokens = jwt
        .issue_pair(user.id, &user.username)
        .internal_err("Failed to generate token")?;

    Ok(AuthResponse {
        user: user.profile(),
        tokens,
    })
}

async fn register(
    State(state): State<SessionState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&payload.username)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let exists = state
        .db
        .users()
        .exists_username_or_email(&payload.username, &payload.email)
        .await
        .db_err("Failed to check existing users")?;

    if exists {
        return Err(ApiError::conflict("User already exists"));
    }

    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .internal_err("Failed to hash password")?
        .internal_err("Failed to hash password")?;

    let new_user = NewUser {
        username: &payload.username,
        email: &payload.email,
        password_hash: &password_hash,
        first_name: &payload.first_name,
        last_name: &payload.last_name,
        is_staff: false,
    };

    let id = match state.db.users().create(&new_user).await {
        Ok(id) => id,
        // Lost a race with a concurrent registration
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("User already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to load new user")?
        .ok_or_else(|| ApiError::internal("Failed to create user"))?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    Ok((StatusCode::CREATED, Json(issue_tokens(&state.jwt, &user)?)))
}

async fn login(
    State(state): State<SessionState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .find_by_login(&payload.username)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| {
            tracing::debug!("Login for unknown user");
            ApiError::unauthorized("Invalid credentials")
        })?;

    let password = payload.password;
    let password_hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .internal_err("Failed to verify password")?
        .internal_err("Failed to verify password")?;

    if !verified {
        tracing::debug!(user_id = user.id, "Login with wrong password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_active {
        tracing::warn!(user_id = user.id, "Login attempt for inactive user");
        return Err(ApiError::forbidden("User is inactive"));
    }

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok(Json(issue_tokens(&state.jwt, &user)?))
}

async fn refresh(
    State(state): State<SessionState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let access_token = state.jwt.refresh(&payload.refresh_token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected refresh token");
        ApiError::unauthorized("Invalid refresh token")
    })?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.access_ttl().as_secs(),
    }))
}

/// Token check for other services.
async fn validate(Auth(user): Auth) -> impl IntoResponse {
    Json(ValidateResponse {
        valid: true,
        user_id: user.user_id(),
        username: user.username().to_string(),
    })
}

/// Tokens are not tracked server-side, so there is nothing to revoke.
async fn logout(Auth(user): Auth) -> impl IntoResponse {
    tracing::debug!(user_id = user.user_id(), "User logged out");
    Json(MessageResponse {
        message: "Logged out successfully",
    })
}
