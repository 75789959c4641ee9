mod config;
mod db;
mod error;
mod handlers;
mod metadata;
mod models;
mod services;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::services::FileService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hashvault=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting hashvault...");

    // Load configuration
    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path, config.database.max_connections).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    // Initialize blob store
    let blobs = storage::build_blob_store(&config.storage)?;

    let state = AppState {
        files: FileService::new(Arc::new(db), blobs),
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let file_routes = Router::new()
        .route("/", get(handlers::file::list_files))
        .route(
            "/upload",
            post(handlers::file::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/degraded", get(handlers::file::list_degraded))
        .route("/download/:content_id", get(handlers::file::download_file))
        .route(
            "/file-name/:content_id",
            get(handlers::file::get_file_by_content_id),
        )
        .route("/:id", get(handlers::file::get_file));

    Router::new()
        .nest("/file", file_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
