//! JWT token generation and validation.
//!
//! Access and refresh tokens share one claim layout and differ only in
//! lifetime. Validation collapses every failure into a single error at the
//! API boundary; `JwtError` keeps the cause for logging.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default access token lifetime: 24 hours
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// JWT claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Database user ID
    pub user_id: i64,
    /// Username at the time the token was minted
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Token signing settings, loaded once at startup.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenSettings {
    /// Settings with the default lifetimes.
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_ttl: DEFAULT_REFRESH_TOKEN_TTL,
        }
    }
}

/// Access + refresh token issued on login or registration.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtConfig {
    pub fn new(settings: &TokenSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(&settings.secret),
            decoding_key: DecodingKey::from_secret(&settings.secret),
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Mint a token for `user_id` valid for `ttl` from now.
    pub fn mint(&self, user_id: i64, username: &str, ttl: Duration) -> Result<String, JwtError> {
        let now = now_secs()?;
        let exp = now
            .checked_add(ttl.as_secs())
            .ok_or(JwtError::LifetimeOverflow)?;
        self.encode(&Claims {
            user_id,
            username: username.to_string(),
            iat: now,
            exp,
        })
    }

    /// Sign an arbitrary claim set.
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Mint the access/refresh pair handed out on login and registration.
    pub fn issue_pair(&self, user_id: i64, username: &str) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.mint(user_id, username, self.access_ttl)?,
            refresh_token: self.mint(user_id, username, self.refresh_ttl)?,
            token_type: "Bearer",
            expires_in: self.access_ttl.as_secs(),
        })
    }

    /// Validate a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_at(token, now_secs()?)
    }

    /// Validate a token as if the current time were `now` (Unix seconds).
    /// The token is valid only while `exp` is strictly after `now`.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked against `now` below.
        validation.validate_exp = false;

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => JwtError::BadSignature,
                _ => JwtError::Malformed(e),
            })?;

        if token_data.claims.exp <= now {
            return Err(JwtError::Expired);
        }

        Ok(token_data.claims)
    }

    /// Exchange a refresh token for a new access token.
    /// The user record is not consulted.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, JwtError> {
        let claims = self.verify(refresh_token)?;
        self.mint(claims.user_id, &claims.username, self.access_ttl)
    }
}

fn now_secs() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token could not be parsed or has invalid claims
    Malformed(jsonwebtoken::errors::Error),
    /// Signature does not match the configured secret
    BadSignature,
    /// Token is past its expiry
    Expired,
    /// System time error
    TimeError,
    /// Expiry does not fit in a Unix timestamp
    LifetimeOverflow,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Malformed(e) => write!(f, "Malformed token: {}", e),
            JwtError::BadSignature => write!(f, "Token signature mismatch"),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::LifetimeOverflow => write!(f, "Token lifetime too long"),
        }
    }
}

impl std::error::Error for JwtError {}
