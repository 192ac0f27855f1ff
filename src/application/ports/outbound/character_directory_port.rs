//! Character Directory port - externally-owned combatant records
//!
//! The directory owns hit points, resources, and casting-context flags
//! for character combatants. Every write carries the version the engine
//! last read; a diverged version is reported as a conflict so the engine
//! can re-read and retry instead of losing an update.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::HitPoints;
use crate::domain::value_objects::{CharacterId, ResourceLedger};

/// A character's combat-relevant record as served by the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantRecord {
    pub character_id: CharacterId,
    pub hit_points: HitPoints,
    pub ledger: ResourceLedger,
    /// Component-check context flags.
    pub silenced: bool,
    pub free_hand: bool,
    pub has_focus: bool,
    /// Optimistic-concurrency version; bumped on every accepted write.
    pub version: u64,
}

/// Partial update; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatantPatch {
    pub hit_points: Option<HitPoints>,
    pub ledger: Option<ResourceLedger>,
}

impl CombatantPatch {
    pub fn hit_points(hit_points: HitPoints) -> Self {
        Self {
            hit_points: Some(hit_points),
            ..Self::default()
        }
    }

    pub fn ledger(ledger: ResourceLedger) -> Self {
        Self {
            ledger: Some(ledger),
            ..Self::default()
        }
    }
}

/// Result of an optimistic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryWriteOutcome {
    /// Write accepted; the record now carries this version.
    Ok { new_version: u64 },
    /// The record moved since the engine's read.
    Conflict { current_version: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("character {0} not found in directory")]
    NotFound(CharacterId),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Outbound port to the Character Directory.
#[async_trait]
pub trait CharacterDirectoryPort: Send + Sync {
    /// Read a character's current record.
    async fn get_combatant(
        &self,
        character_id: CharacterId,
    ) -> Result<CombatantRecord, DirectoryError>;

    /// Apply a patch iff the record is still at `expected_version`.
    async fn update_combatant(
        &self,
        character_id: CharacterId,
        patch: CombatantPatch,
        expected_version: u64,
    ) -> Result<DirectoryWriteOutcome, DirectoryError>;
}
