//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;

use crate::application::ports::outbound::EncounterStorePort;
use crate::application::services::EncounterService;
use crate::infrastructure::catalog::InMemoryContentCatalog;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::directory::InMemoryCharacterDirectory;
use crate::infrastructure::hub::EncounterHub;
use crate::infrastructure::persistence::{InMemoryEncounterStore, SqliteEncounterStore};

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    /// Character Directory adapter; exposed so operators can seed demo
    /// records
    pub directory: Arc<InMemoryCharacterDirectory>,
    /// The rules engine and its delta hub
    pub engine: Arc<EncounterService>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn EncounterStorePort> = if config.database_url == "memory" {
            Arc::new(InMemoryEncounterStore::new())
        } else {
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&config.database_url)
                .await?;
            Arc::new(SqliteEncounterStore::new(pool).await?)
        };

        let directory = Arc::new(InMemoryCharacterDirectory::new());
        let catalog = Arc::new(InMemoryContentCatalog::sample());
        let hub = Arc::new(EncounterHub::new());

        let engine = EncounterService::new(
            directory.clone(),
            catalog,
            store,
            hub,
            Duration::from_millis(config.lock_timeout_ms),
        )
        .with_retry_limit(config.directory_retry_limit);

        Ok(Self {
            config,
            directory,
            engine: Arc::new(engine),
        })
    }
}
