//! Current-user profile endpoints.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{ApiError, ApiJson, ResultExt, validate_email};
use crate::auth::Auth;
use crate::db::{Database, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct ProfileState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(ProfileState);

pub fn router(state: ProfileState) -> Router {
    Router::new()
        .route("/me", get(get_profile).put(update_profile))
        .with_state(state)
}

/// Fields a user may change on their own record. Omitted fields are kept.
#[derive(Deserialize)]
struct UpdateProfileRequest {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

async fn get_profile(
    State(state): State<ProfileState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(auth.user_id())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.profile()))
}

async fn update_profile(
    State(state): State<ProfileState>,
    Auth(auth): Auth,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }

    let mut user = state
        .db
        .users()
        .get_by_id(auth.user_id())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(first_name) = payload.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = payload.last_name {
        user.last_name = last_name;
    }
    if let Some(email) = payload.email {
        user.email = email;
    }

    let saved = match state.db.users().save(&user).await {
        Ok(saved) => saved,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Email is already in use"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update profile", e)),
    };

    if !saved {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(Json(user.profile()))
}
