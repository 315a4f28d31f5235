//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::bearer::bearer_token;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::{AuthenticatedUser, StaffUser};

/// Extractor for endpoints that require a valid bearer token.
///
/// Verification is purely cryptographic: the user record is not consulted,
/// so a token stays usable until it expires even if the account is
/// deactivated or deleted.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::debug!(path = %parts.uri.path(), "Request without bearer token");
            ApiAuthError::new(AuthErrorKind::NotAuthenticated)
        })?;

        let claims = state.jwt().verify(token).map_err(|e| {
            tracing::debug!(path = %parts.uri.path(), error = %e, "Rejected bearer token");
            ApiAuthError::new(AuthErrorKind::InvalidToken)
        })?;

        Ok(Auth(AuthenticatedUser { claims }))
    }
}

/// Extractor for admin endpoints.
///
/// Runs `Auth` first, then loads the token's user and requires the staff
/// flag. A user that no longer exists is rejected the same way as a
/// non-staff user.
pub struct StaffAuth(pub StaffUser);

impl<S> FromRequestParts<S> for StaffAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(identity) = Auth::from_request_parts(parts, state).await?;

        let user = state
            .db()
            .users()
            .get_by_id(identity.user_id())
            .await
            .map_err(|e| {
                tracing::error!("Failed to load user for staff check: {}", e);
                ApiAuthError::new(AuthErrorKind::DatabaseError)
            })?
            .ok_or_else(|| {
                tracing::warn!(user_id = identity.user_id(), "Staff check for missing user");
                ApiAuthError::new(AuthErrorKind::UserNotFound)
            })?;

        if !user.is_staff {
            tracing::warn!(
                user_id = user.id,
                username = %user.username,
                "Non-staff user attempted admin access"
            );
            return Err(ApiAuthError::new(AuthErrorKind::NotStaff));
        }

        Ok(StaffAuth(StaffUser::new(identity, user)))
    }
}
