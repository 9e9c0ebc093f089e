//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, FsAssetStore, MemoryDocumentStore},
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use course_sync_core::{cleanup_channel, CourseSyncService, DocumentStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Document Store & Run Migrations ---
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; using the in-memory document store");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    // --- 3. Initialize the Asset Store & Cleanup Worker ---
    let assets = Arc::new(
        FsAssetStore::new(&config.upload_dir, config.public_base_url.clone()).await?,
    );
    info!("Serving uploads from {}", config.upload_dir.display());

    let shutdown = CancellationToken::new();
    let (cleanup_queue, cleanup_worker) =
        cleanup_channel(assets.clone(), config.cleanup_settings(), shutdown.clone());
    let cleanup_task = tokio::spawn(cleanup_worker.run());

    // --- 4. Build the Shared AppState ---
    let sync = Arc::new(CourseSyncService::new(
        store,
        assets,
        cleanup_queue,
        config.upload_limits(),
    ));
    let app_state = Arc::new(AppState {
        sync,
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = build_router(app_state).layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // --- 7. Let pending asset deletions finish ---
    shutdown.cancel();
    if let Err(e) = cleanup_task.await {
        warn!("Cleanup worker ended abnormally: {}", e);
    }

    Ok(())
}
