//! services/api/src/error.rs
//!
//! Startup errors of the course API service. Request-time failures are
//! `SyncError`s and are turned into HTTP responses in `web::rest`.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting to PostgreSQL failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to apply course catalog migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Creating the upload tree or binding the listener failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
