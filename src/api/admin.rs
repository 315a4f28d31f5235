//! Admin API endpoints.
//!
//! All endpoints require a staff account.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{
    ApiError, ApiJson, ResultExt, parse_user_id, validate_email, validate_username,
};
use crate::auth::StaffAuth;
use crate::db::{Database, UserProfile, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/count", get(count_users))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    is_active: Option<bool>,
    is_staff: Option<bool>,
}

#[derive(Serialize)]
struct CountResponse {
    total: i64,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// List all users ordered by id.
async fn list_users(
    State(state): State<AdminState>,
    _staff: StaffAuth,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?;

    let profiles: Vec<UserProfile> = users.iter().map(|u| u.profile()).collect();
    Ok(Json(profiles))
}

async fn count_users(
    State(state): State<AdminState>,
    _staff: StaffAuth,
) -> Result<impl IntoResponse, ApiError> {
    let total = state
        .db
        .users()
        .count()
        .await
        .db_err("Failed to count users")?;

    Ok(Json(CountResponse { total }))
}

async fn get_user(
    State(state): State<AdminState>,
    _staff: StaffAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&id)?;

    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.profile()))
}

async fn update_user(
    State(state): State<AdminState>,
    StaffAuth(staff): StaffAuth,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&id)?;

    if let Some(username) = &payload.username {
        validate_username(username)?;
    }
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }

    let mut user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(username) = payload.username {
        user.username = username;
    }
    if let Some(email) = payload.email {
        user.email = email;
    }
    if let Some(first_name) = payload.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = payload.last_name {
        user.last_name = last_name;
    }
    if let Some(is_active) = payload.is_active {
        user.is_active = is_active;
    }
    if let Some(is_staff) = payload.is_staff {
        user.is_staff = is_staff;
    }

    let saved = match state.db.users().save(&user).await {
        Ok(saved) => saved,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Username or email is already in use"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update user", e)),
    };

    if !saved {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(
        admin = %staff.identity().username(),
        user_id = user.id,
        "Admin updated user"
    );

    Ok(Json(user.profile()))
}

async fn delete_user(
    State(state): State<AdminState>,
    StaffAuth(staff): StaffAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&id)?;

    let deleted = state
        .db
        .users()
        .delete(id)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(admin_id = staff.user().id, user_id = id, "Admin deleted user");

    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
