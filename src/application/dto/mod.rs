//! Application DTOs - intent payloads crossing the engine surface

use serde::{Deserialize, Serialize};

use crate::domain::entities::CombatantKind;
use crate::domain::value_objects::ResourceLedger;

/// Roster addition issued by the director while the encounter prepares.
///
/// Character combatants are seeded from their Character Directory record
/// (hit points, resources); monster combatants are seeded from the
/// Content Catalog definition. Explicit fields override the looked-up
/// values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCombatantSpec {
    pub kind: CombatantKind,
    pub name: String,
    pub initiative_roll: i32,
    #[serde(default)]
    pub armor_class: Option<i32>,
    #[serde(default)]
    pub attack_bonus: Option<i32>,
    #[serde(default)]
    pub dexterity_modifier: Option<i32>,
    #[serde(default)]
    pub passive_perception: Option<i32>,
    /// Engine-local ledger for monster combatants; ignored for
    /// characters, whose ledger mirrors the directory.
    #[serde(default)]
    pub ledger: Option<ResourceLedger>,
}
