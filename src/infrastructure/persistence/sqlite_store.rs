//! SQLite Persistent Store adapter
//!
//! Append-only event log plus a latest-state snapshot per encounter,
//! both stored as JSON text columns.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::application::ports::outbound::{EncounterStorePort, StoreError};
use crate::domain::aggregates::EncounterState;
use crate::domain::events::DeltaEvent;
use crate::domain::value_objects::EncounterId;

pub struct SqliteEncounterStore {
    pool: SqlitePool,
}

impl SqliteEncounterStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        // Create tables if not exists
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS encounter_events (
                encounter_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                event TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (encounter_id, sequence)
            )
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS encounter_snapshots (
                encounter_id TEXT PRIMARY KEY,
                sequence INTEGER NOT NULL,
                state TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    #[allow(dead_code)] // Kept for future maintenance queries over the event log
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl EncounterStorePort for SqliteEncounterStore {
    async fn append_event(&self, event: &DeltaEvent) -> Result<(), StoreError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        sqlx::query(
            "INSERT INTO encounter_events (encounter_id, sequence, event) VALUES (?, ?, ?)",
        )
        .bind(event.encounter_id.to_string())
        .bind(event.sequence as i64)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn save_snapshot(
        &self,
        encounter_id: EncounterId,
        state: &EncounterState,
        sequence: u64,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(state)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        sqlx::query(
            "INSERT OR REPLACE INTO encounter_snapshots (encounter_id, sequence, state, updated_at) \
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)",
        )
        .bind(encounter_id.to_string())
        .bind(sequence as i64)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn load_snapshot(
        &self,
        encounter_id: EncounterId,
    ) -> Result<Option<(EncounterState, u64)>, StoreError> {
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT state, sequence FROM encounter_snapshots WHERE encounter_id = ?",
        )
        .bind(encounter_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        match row {
            Some((state, sequence)) => {
                let state: EncounterState = serde_json::from_str(&state)
                    .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
                Ok(Some((state, sequence as u64)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DeltaKind;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteEncounterStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteEncounterStore::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_event_append_and_snapshot_round_trip() {
        let store = store().await;
        let state = EncounterState::new("Persisted");
        let encounter_id = state.id();

        store
            .append_event(&DeltaEvent::new(
                encounter_id,
                1,
                DeltaKind::EncounterPaused,
            ))
            .await
            .unwrap();
        store.save_snapshot(encounter_id, &state, 1).await.unwrap();

        let (loaded, sequence) = store.load_snapshot(encounter_id).await.unwrap().unwrap();
        assert_eq!(loaded.id(), encounter_id);
        assert_eq!(loaded.encounter.name, "Persisted");
        assert_eq!(sequence, 1);
    }

    #[tokio::test]
    async fn test_duplicate_sequence_is_rejected() {
        let store = store().await;
        let encounter_id = EncounterId::new();
        let event = DeltaEvent::new(encounter_id, 1, DeltaKind::EncounterPaused);

        store.append_event(&event).await.unwrap();
        // The log is append-only with (encounter, sequence) identity.
        assert!(store.append_event(&event).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_none() {
        let store = store().await;
        assert!(store
            .load_snapshot(EncounterId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("encounters.db").display()
        );
        let state = EncounterState::new("Durable");
        let encounter_id = state.id();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        let store = SqliteEncounterStore::new(pool).await.unwrap();
        store.save_snapshot(encounter_id, &state, 3).await.unwrap();
        store.pool().close().await;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        let store = SqliteEncounterStore::new(pool).await.unwrap();
        let (loaded, sequence) = store.load_snapshot(encounter_id).await.unwrap().unwrap();
        assert_eq!(loaded.encounter.name, "Durable");
        assert_eq!(sequence, 3);
    }

    #[tokio::test]
    async fn test_snapshot_upsert_keeps_latest() {
        let store = store().await;
        let state = EncounterState::new("Versioned");
        let encounter_id = state.id();

        store.save_snapshot(encounter_id, &state, 1).await.unwrap();
        store.save_snapshot(encounter_id, &state, 5).await.unwrap();

        let (_, sequence) = store.load_snapshot(encounter_id).await.unwrap().unwrap();
        assert_eq!(sequence, 5);
    }
}
