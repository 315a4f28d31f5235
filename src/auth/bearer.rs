//! Bearer token parsing for the Authorization header.

use axum::http::{HeaderMap, header};

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The header must split on single spaces into exactly a scheme and a
/// non-empty token. Anything else is treated as no token at all.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut segments = value.split(' ');

    let (Some(scheme), Some(token), None) = (segments.next(), segments.next(), segments.next())
    else {
        return None;
    };

    if !scheme.eq_ignore_ascii_case("Bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}
