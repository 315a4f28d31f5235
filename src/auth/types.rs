//! Authentication user types.

use crate::db::User;
use crate::jwt::Claims;

/// Identity bound by the auth gate from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Verified token claims
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> i64 {
        self.claims.user_id
    }

    pub fn username(&self) -> &str {
        &self.claims.username
    }
}

/// A request that passed the auth gate and then the staff check.
///
/// Only the `StaffAuth` extractor builds this, and it does so from an
/// `AuthenticatedUser`, so the staff check can never run without a verified
/// token.
#[derive(Debug, Clone)]
pub struct StaffUser {
    identity: AuthenticatedUser,
    user: User,
}

impl StaffUser {
    pub(super) fn new(identity: AuthenticatedUser, user: User) -> Self {
        Self { identity, user }
    }

    pub fn identity(&self) -> &AuthenticatedUser {
        &self.identity
    }

    /// The staff user's database record as loaded by the staff check.
    pub fn user(&self) -> &User {
        &self.user
    }
}
