//! Rate limiting for credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::api::ApiError;
use crate::auth::client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Bucket key for requests whose client IP cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Per-minute quotas, taken from the command line.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub login_per_minute: u32,
    pub register_per_minute: u32,
    /// Key buckets on the first `X-Forwarded-For` entry when present
    pub trust_proxy: bool,
}

/// Rate limiters for the credential endpoints.
pub struct RateLimitConfig {
    pub login: IpLimiter,
    pub register: IpLimiter,
    trust_proxy: bool,
}

impl RateLimitConfig {
    /// A quota of zero is raised to one request per minute.
    pub fn new(settings: &RateLimitSettings) -> Self {
        let per_minute = |n: u32| Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN));

        Self {
            login: RateLimiter::keyed(per_minute(settings.login_per_minute)),
            register: RateLimiter::keyed(per_minute(settings.register_per_minute)),
            trust_proxy: settings.trust_proxy,
        }
    }

    fn client_key(&self, request: &Request) -> String {
        client_ip(request, self.trust_proxy).unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

fn too_many_requests(message: &str) -> Response {
    ApiError::TooManyRequests(message.to_string()).into_response()
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = config.client_key(&request);

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(client_ip = %ip, "Login rate limit exceeded");
            too_many_requests("Too many login attempts. Please wait before trying again.")
        }
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = config.client_key(&request);

    match config.register.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(client_ip = %ip, "Registration rate limit exceeded");
            too_many_requests("Too many signup attempts. Please wait before trying again.")
        }
    }
}
