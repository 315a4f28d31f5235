//! CLI argument parsing, validation, and startup helpers.

use crate::api::{validate_email, validate_password, validate_username};
use crate::db::{Database, NewUser};
use crate::jwt::TokenSettings;
use crate::media::{DEFAULT_MAX_FILE_SIZE, S3Settings};
use crate::password::{PasswordError, hash_password};
use crate::rate_limit::RateLimitSettings;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::time::Duration;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "libhub", about = "Library account and media services")]
pub struct Args {
    /// Log output format
    #[arg(short, long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the auth service
    Auth(AuthArgs),
    /// Run the media service
    Media(MediaArgs),
    /// Create a staff user and exit
    CreateAdmin(CreateAdminArgs),
}

/// Longest accepted token lifetime: 10 years.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(clap::Args, Debug, Clone)]
pub struct AuthArgs {
    /// Port to listen on
    #[arg(short, long, env = "AUTH_PORT", default_value = "8001")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "libhub.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "86400", value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value = "604800", value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub refresh_token_ttl: u64,

    /// Login attempts allowed per client IP per minute
    #[arg(long, default_value = "10")]
    pub login_per_minute: u32,

    /// Registrations allowed per client IP per minute
    #[arg(long, default_value = "3")]
    pub register_per_minute: u32,

    /// Take the client IP from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long)]
    pub trust_proxy: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MediaArgs {
    /// Port to listen on
    #[arg(short, long, env = "MEDIA_PORT", default_value = "8005")]
    pub port: u16,

    /// S3 endpoint as host:port or full URL
    #[arg(long, env = "S3_ENDPOINT", default_value = "localhost:9000")]
    pub s3_endpoint: String,

    #[arg(long, env = "S3_ACCESS_KEY", default_value = "minioadmin")]
    pub s3_access_key: String,

    #[arg(long, env = "S3_SECRET_KEY", default_value = "minioadmin", hide_env_values = true)]
    pub s3_secret_key: String,

    /// Use HTTPS when the endpoint has no scheme
    #[arg(long, env = "S3_USE_SSL")]
    pub s3_use_ssl: bool,

    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    /// Bucket holding uploaded files (created on startup if missing)
    #[arg(long, env = "S3_BUCKET", default_value = "media")]
    pub bucket: String,

    /// Largest accepted upload in bytes
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: usize,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CreateAdminArgs {
    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "libhub.db")]
    pub database: String,

    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, default_value = "")]
    pub first_name: String,

    #[arg(long, default_value = "")]
    pub last_name: String,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

impl AuthArgs {
    pub fn token_settings(&self, secret: String) -> TokenSettings {
        TokenSettings {
            secret: secret.into_bytes(),
            access_ttl: Duration::from_secs(self.access_token_ttl),
            refresh_ttl: Duration::from_secs(self.refresh_token_ttl),
        }
    }

    pub fn rate_limit_settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            login_per_minute: self.login_per_minute,
            register_per_minute: self.register_per_minute,
            trust_proxy: self.trust_proxy,
        }
    }
}

impl MediaArgs {
    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            endpoint: self.s3_endpoint.clone(),
            access_key: self.s3_access_key.clone(),
            secret_key: self.s3_secret_key.clone(),
            use_ssl: self.s3_use_ssl,
            region: self.s3_region.clone(),
            bucket: self.bucket.clone(),
        }
    }
}

#[derive(Debug)]
pub enum CreateAdminError {
    /// A user with the same username or email already exists
    AlreadyExists,
    Invalid(String),
    Password(PasswordError),
    Database(sqlx::Error),
}

impl std::fmt::Display for CreateAdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreateAdminError::AlreadyExists => {
                write!(f, "user with this username or email already exists")
            }
            CreateAdminError::Invalid(msg) => write!(f, "{}", msg),
            CreateAdminError::Password(e) => write!(f, "{}", e),
            CreateAdminError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for CreateAdminError {}

/// Create an active staff user. Returns the new user's id.
pub async fn create_admin(
    db: &Database,
    args: &CreateAdminArgs,
    password: &str,
) -> Result<i64, CreateAdminError> {
    validate_username(&args.username)
        .and_then(|_| validate_email(&args.email))
        .and_then(|_| validate_password(password))
        .map_err(|e| CreateAdminError::Invalid(e.message().to_string()))?;

    let exists = db
        .users()
        .exists_username_or_email(&args.username, &args.email)
        .await
        .map_err(CreateAdminError::Database)?;
    if exists {
        return Err(CreateAdminError::AlreadyExists);
    }

    let password_hash = hash_password(password).map_err(CreateAdminError::Password)?;

    db.users()
        .create(&NewUser {
            username: &args.username,
            email: &args.email,
            password_hash: &password_hash,
            first_name: &args.first_name,
            last_name: &args.last_name,
            is_staff: true,
        })
        .await
        .map_err(CreateAdminError::Database)
}

/// Read the admin password from ADMIN_PASSWORD, falling back to the first
/// line of stdin.
pub fn read_admin_password() -> Option<String> {
    if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("ADMIN_PASSWORD") };
        return Some(password);
    }

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let password = line.trim_end_matches(['\r', '\n']).to_string();
            (!password.is_empty()).then_some(password)
        }
        Err(e) => {
            error!(error = %e, "Failed to read password from stdin");
            None
        }
    }
}

/// Handle the create-admin subcommand. Exits the process on failure.
pub async fn handle_create_admin(db: &Database, args: &CreateAdminArgs) {
    let Some(password) = read_admin_password() else {
        error!("Admin password is required. Set ADMIN_PASSWORD or pipe it on stdin");
        std::process::exit(1);
    };

    match create_admin(db, args, &password).await {
        Ok(id) => {
            info!(user_id = id, username = %args.username, "Admin user created");
            println!();
            println!("Admin user created: {} (id {})", args.username, id);
            println!();
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}
