//! In-memory Persistent Store adapter

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::ports::outbound::{EncounterStorePort, StoreError};
use crate::domain::aggregates::EncounterState;
use crate::domain::events::DeltaEvent;
use crate::domain::value_objects::EncounterId;

/// Event log and snapshots held in process memory. Used by tests and by
/// servers run without a database.
pub struct InMemoryEncounterStore {
    events: Mutex<HashMap<EncounterId, Vec<DeltaEvent>>>,
    snapshots: Mutex<HashMap<EncounterId, (EncounterState, u64)>>,
}

impl InMemoryEncounterStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn event_count(&self, encounter_id: EncounterId) -> usize {
        self.events
            .lock()
            .await
            .get(&encounter_id)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    #[allow(dead_code)] // Kept for debugging event streams in tests
    pub async fn events_for(&self, encounter_id: EncounterId) -> Vec<DeltaEvent> {
        self.events
            .lock()
            .await
            .get(&encounter_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryEncounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncounterStorePort for InMemoryEncounterStore {
    async fn append_event(&self, event: &DeltaEvent) -> Result<(), StoreError> {
        self.events
            .lock()
            .await
            .entry(event.encounter_id)
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn save_snapshot(
        &self,
        encounter_id: EncounterId,
        state: &EncounterState,
        sequence: u64,
    ) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .await
            .insert(encounter_id, (state.clone(), sequence));
        Ok(())
    }

    async fn load_snapshot(
        &self,
        encounter_id: EncounterId,
    ) -> Result<Option<(EncounterState, u64)>, StoreError> {
        Ok(self.snapshots.lock().await.get(&encounter_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DeltaKind;

    #[tokio::test]
    async fn test_append_and_snapshot_round_trip() {
        let store = InMemoryEncounterStore::new();
        let state = EncounterState::new("Test");
        let encounter_id = state.id();

        let event = DeltaEvent::new(encounter_id, 1, DeltaKind::EncounterPaused);
        store.append_event(&event).await.unwrap();
        store.save_snapshot(encounter_id, &state, 1).await.unwrap();

        assert_eq!(store.event_count(encounter_id).await, 1);
        let (loaded, sequence) = store.load_snapshot(encounter_id).await.unwrap().unwrap();
        assert_eq!(loaded.id(), encounter_id);
        assert_eq!(sequence, 1);
    }
}
