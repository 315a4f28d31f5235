use std::sync::Arc;

use clap::Parser;
use libhub::cli::{
    Args, AuthArgs, Command, MediaArgs, handle_create_admin, init_logging, load_jwt_secret,
    open_database,
};
use libhub::media::S3Store;
use libhub::{AuthServerConfig, MediaServerConfig, create_auth_app, create_media_app, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    match args.command {
        Command::Auth(auth) => run_auth(auth).await,
        Command::Media(media) => run_media(media).await,
        Command::CreateAdmin(admin) => {
            let Some(db) = open_database(&admin.database).await else {
                std::process::exit(1);
            };
            handle_create_admin(&db, &admin).await;
            db.close().await;
        }
    }
}

async fn bind(port: u16) -> tokio::net::TcpListener {
    let addr = format!("0.0.0.0:{}", port);
    tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        })
}

async fn serve(app: axum::Router, listener: tokio::net::TcpListener) {
    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to get local address"),
    }

    if let Err(e) = run_server(app, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn run_auth(args: AuthArgs) {
    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let config = AuthServerConfig {
        db,
        tokens: args.token_settings(jwt_secret),
        rate_limits: args.rate_limit_settings(),
    };
    let app = create_auth_app(&config);

    let listener = bind(args.port).await;
    serve(app, listener).await;
}

async fn run_media(args: MediaArgs) {
    let settings = args.s3_settings();

    let store = match S3Store::connect(&settings).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to configure object store");
            std::process::exit(1);
        }
    };

    if let Err(e) = store.ensure_bucket().await {
        error!(bucket = %store.bucket(), error = %e, "Failed to prepare bucket");
        std::process::exit(1);
    }
    info!(bucket = %store.bucket(), "Object store ready");

    let config = MediaServerConfig {
        store: Arc::new(store),
        max_file_size: args.max_file_size,
    };
    let app = create_media_app(&config);

    let listener = bind(args.port).await;
    serve(app, listener).await;
}
