//! Newswire Server
//!
//! A small authenticated news service: users register, authenticate, post
//! news items and toggle likes. Likes are kept consistent with the
//! denormalized per-item counter by the transactional storage layer.
//!
//! Uses SQLite (embedded) for storage.

mod error;
mod extractors;
mod handlers;
mod services;
mod storage;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use services::AuthService;
use storage::Database;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth_service: Arc<AuthService>,
    pub top_news_limit: i64,
}

#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|s| Level::from_str(&s).ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Newswire Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, db={}, top_news_limit={}",
        config.bind_address, config.database_path, config.top_news_limit
    );

    let db = Arc::new(
        Database::new(&config.database_path)
            .await
            .context("Failed to initialize database")?,
    );

    let auth_service = Arc::new(AuthService::new(db.clone(), config.session_secret.clone()));

    let state = AppState {
        db,
        auth_service,
        top_news_limit: config.top_news_limit,
    };

    let app = router(state);

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/signup", post(handlers::auth::signup))
        .route("/signin", post(handlers::auth::signin))
        .route("/news", post(handlers::news::create))
        .route("/news/top", get(handlers::news::top))
        .route("/news/:id", get(handlers::news::get))
        .route("/news/:id/like", post(handlers::news::like))
        .route("/news/:id/dislike", post(handlers::news::dislike))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Clone)]
struct Config {
    bind_address: String,
    database_path: String,
    session_secret: String,
    top_news_limit: i64,
}

fn load_config() -> Result<Config> {
    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/newswire.db".to_string());

    let session_secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| {
        warn!("SESSION_SECRET not set, using default (insecure for production)");
        "change-me-in-production".to_string()
    });

    let top_news_limit: i64 = std::env::var("TOP_NEWS_LIMIT")
        .unwrap_or_else(|_| "20".to_string())
        .parse()
        .context("TOP_NEWS_LIMIT must be an integer")?;
    if top_news_limit <= 0 {
        anyhow::bail!("TOP_NEWS_LIMIT must be positive, got {}", top_news_limit);
    }

    Ok(Config {
        bind_address,
        database_path,
        session_secret,
        top_news_limit,
    })
}
