//! Bearer token authentication and the staff gate.
//!
//! `Auth` verifies the `Authorization: Bearer` header against the signing
//! secret and binds the token's identity. `StaffAuth` builds on it and
//! additionally requires the user record to carry the staff flag.

mod bearer;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use bearer::bearer_token;
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Auth, StaffAuth};
pub use ip::{FORWARDED_FOR_HEADER, HasHeadersAndExtensions, client_ip};
pub use state::HasAuthBackend;
pub use types::{AuthenticatedUser, StaffUser};
