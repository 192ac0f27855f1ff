//! Persistent Store port - append-only event log plus latest snapshot

use async_trait::async_trait;

use crate::domain::aggregates::EncounterState;
use crate::domain::events::DeltaEvent;
use crate::domain::value_objects::EncounterId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    WriteFailed(String),
    #[error("store read failed: {0}")]
    ReadFailed(String),
}

/// Outbound port to the Persistent Store. The engine appends every
/// accepted delta and upserts the latest snapshot keyed by encounter id.
#[async_trait]
pub trait EncounterStorePort: Send + Sync {
    async fn append_event(&self, event: &DeltaEvent) -> Result<(), StoreError>;

    async fn save_snapshot(
        &self,
        encounter_id: EncounterId,
        state: &EncounterState,
        sequence: u64,
    ) -> Result<(), StoreError>;

    /// Latest snapshot and its sequence number, if one was ever saved.
    async fn load_snapshot(
        &self,
        encounter_id: EncounterId,
    ) -> Result<Option<(EncounterState, u64)>, StoreError>;
}
