//! In-memory Character Directory adapter
//!
//! Stand-in for the external directory service: versioned records with
//! compare-and-swap update semantics, so the engine's optimistic
//! concurrency cycle behaves exactly as it does against the real
//! collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::ports::outbound::{
    CharacterDirectoryPort, CombatantPatch, CombatantRecord, DirectoryError,
    DirectoryWriteOutcome,
};
use crate::domain::entities::HitPoints;
use crate::domain::value_objects::{CharacterId, ResourceLedger};

pub struct InMemoryCharacterDirectory {
    records: Mutex<HashMap<CharacterId, CombatantRecord>>,
}

impl InMemoryCharacterDirectory {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Seed or replace a record at version 1.
    pub async fn upsert_record(
        &self,
        character_id: CharacterId,
        hit_points: HitPoints,
        ledger: ResourceLedger,
    ) {
        let record = CombatantRecord {
            character_id,
            hit_points,
            ledger,
            silenced: false,
            free_hand: true,
            has_focus: true,
            version: 1,
        };
        self.records.lock().await.insert(character_id, record);
    }

    /// Flip the casting-context flags on a record.
    #[allow(dead_code)] // Kept for operator tooling that seeds demo scenarios
    pub async fn set_flags(
        &self,
        character_id: CharacterId,
        silenced: bool,
        free_hand: bool,
        has_focus: bool,
    ) {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&character_id) {
            record.silenced = silenced;
            record.free_hand = free_hand;
            record.has_focus = has_focus;
            record.version += 1;
        }
    }
}

impl Default for InMemoryCharacterDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CharacterDirectoryPort for InMemoryCharacterDirectory {
    async fn get_combatant(
        &self,
        character_id: CharacterId,
    ) -> Result<CombatantRecord, DirectoryError> {
        self.records
            .lock()
            .await
            .get(&character_id)
            .cloned()
            .ok_or(DirectoryError::NotFound(character_id))
    }

    async fn update_combatant(
        &self,
        character_id: CharacterId,
        patch: CombatantPatch,
        expected_version: u64,
    ) -> Result<DirectoryWriteOutcome, DirectoryError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&character_id)
            .ok_or(DirectoryError::NotFound(character_id))?;

        if record.version != expected_version {
            return Ok(DirectoryWriteOutcome::Conflict {
                current_version: record.version,
            });
        }

        if let Some(hit_points) = patch.hit_points {
            record.hit_points = hit_points;
        }
        if let Some(ledger) = patch.ledger {
            record.ledger = ledger;
        }
        record.version += 1;
        Ok(DirectoryWriteOutcome::Ok {
            new_version: record.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let directory = InMemoryCharacterDirectory::new();
        let character_id = CharacterId::new();
        directory
            .upsert_record(character_id, HitPoints::full(20), ResourceLedger::new())
            .await;

        let record = directory.get_combatant(character_id).await.unwrap();
        let patch = CombatantPatch::hit_points(record.hit_points.apply_damage(5));

        let first = directory
            .update_combatant(character_id, patch.clone(), record.version)
            .await
            .unwrap();
        assert!(matches!(first, DirectoryWriteOutcome::Ok { new_version: 2 }));

        // A second write against the old version is refused.
        let second = directory
            .update_combatant(character_id, patch, record.version)
            .await
            .unwrap();
        assert!(matches!(
            second,
            DirectoryWriteOutcome::Conflict { current_version: 2 }
        ));
    }

    #[tokio::test]
    async fn test_missing_record_errors() {
        let directory = InMemoryCharacterDirectory::new();
        let missing = CharacterId::new();
        assert!(matches!(
            directory.get_combatant(missing).await,
            Err(DirectoryError::NotFound(_))
        ));
    }
}
