//! Application configuration

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// WebSocket server port
    pub server_port: u16,
    /// SQLite database URL for the event log; "memory" selects the
    /// in-process store
    pub database_url: String,
    /// Bound on waiting for an encounter's serialization slot (ms)
    pub lock_timeout_ms: u64,
    /// Bound on directory read-validate-write retries
    pub directory_retry_limit: u32,
    /// Interval between sweeps of ended encounters (secs)
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:encounters.db?mode=rwc".to_string()),
            lock_timeout_ms: env::var("INTENT_LOCK_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("INTENT_LOCK_TIMEOUT_MS must be a number of milliseconds")?,
            directory_retry_limit: env::var("DIRECTORY_RETRY_LIMIT")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("DIRECTORY_RETRY_LIMIT must be a small integer")?,
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("SWEEP_INTERVAL_SECS must be a number of seconds")?,
        })
    }
}
