//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use course_sync_core::{CleanupSettings, UploadLimits};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// PostgreSQL connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub upload_dir: PathBuf,
    /// Origin prefixed to every public asset path, e.g. `https://cdn.example.com`.
    pub public_base_url: Option<String>,
    /// `production` hides diagnostic detail from error responses.
    pub app_env: String,
    pub max_file_bytes: u64,
    pub max_files: usize,
    pub cleanup_max_attempts: u32,
    pub cleanup_backoff_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Asset Storage Settings ---
        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        // --- Load Upload and Cleanup Limits ---
        let max_file_bytes = parse_var("MAX_FILE_BYTES", 100 * 1024 * 1024)?;
        let max_files = parse_var("MAX_FILES", 20)?;
        let cleanup_max_attempts = parse_var("CLEANUP_MAX_ATTEMPTS", 3)?;
        let cleanup_backoff_ms = parse_var("CLEANUP_BACKOFF_MS", 200)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            upload_dir,
            public_base_url,
            app_env,
            max_file_bytes,
            max_files,
            cleanup_max_attempts,
            cleanup_backoff_ms,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_bytes: self.max_file_bytes,
            max_files: self.max_files,
        }
    }

    pub fn cleanup_settings(&self) -> CleanupSettings {
        CleanupSettings {
            max_attempts: self.cleanup_max_attempts,
            backoff: Duration::from_millis(self.cleanup_backoff_ms),
        }
    }

    /// Largest request body the server accepts: every file at its limit plus
    /// room for the text fields.
    pub fn body_limit(&self) -> usize {
        let files = self.max_file_bytes.saturating_mul(self.max_files as u64);
        usize::try_from(files.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default() {
        let value: u32 = parse_var("COURSE_SYNC_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn body_limit_covers_all_files() {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: None,
            log_level: Level::INFO,
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: None,
            app_env: "Production".into(),
            max_file_bytes: 10,
            max_files: 2,
            cleanup_max_attempts: 3,
            cleanup_backoff_ms: 200,
        };
        assert_eq!(config.body_limit(), 20 + 1024 * 1024);
        assert!(config.is_production());
    }
}
