//! Delta events - the ordered state-change stream per encounter
//!
//! Every accepted mutation yields exactly one `DeltaEvent` with a
//! per-encounter monotonic sequence number. Subscribers apply deltas in
//! sequence order; a gap means a missed event and triggers a full resync
//! instead of applying a partial delta.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::Ability;
use crate::domain::errors::Warning;
use crate::domain::value_objects::{
    AdvantageMode, AttackOutcome, CombatModifier, CombatantId, EffectId, EncounterId, PromptId,
    RestKind, SpellId,
};

/// Typed payload of a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaKind {
    CombatantAdded {
        combatant_id: CombatantId,
        name: String,
        initiative_roll: i32,
    },
    EncounterStarted {
        round: u32,
        first_combatant: CombatantId,
    },
    EncounterPaused,
    EncounterResumed,
    EncounterEnded,
    TurnAdvanced {
        round: u32,
        new_round: bool,
        previous_combatant: CombatantId,
        active_combatant: CombatantId,
        expired_effects: Vec<EffectId>,
    },
    AttackResolved {
        attacker: CombatantId,
        target_ac: i32,
        outcome: AttackOutcome,
    },
    SpellCast {
        caster: CombatantId,
        spell_id: SpellId,
        spell_name: String,
        cast_level: u8,
        /// Extra scaling units over the base cast, e.g. 2 for "+2d6".
        extra_units: u32,
        scaling_unit: Option<String>,
        effect_id: Option<EffectId>,
    },
    DamageApplied {
        target: CombatantId,
        amount: i32,
        damage_type: String,
        remaining_hp: i32,
    },
    HealingApplied {
        target: CombatantId,
        amount: i32,
        remaining_hp: i32,
    },
    ModifierAdded {
        combatant_id: CombatantId,
        modifier: CombatModifier,
    },
    RestTaken {
        combatant_id: CombatantId,
        rest: RestKind,
    },
    EffectRegistered {
        effect_id: EffectId,
        name: String,
        owner: CombatantId,
    },
    EffectEnded {
        effect_id: EffectId,
    },
    SavePromptIssued {
        prompt_id: PromptId,
        ability: Ability,
        dc: i32,
        advantage: AdvantageMode,
        expected_responses: u32,
    },
    SaveResponseRecorded {
        prompt_id: PromptId,
        combatant_id: CombatantId,
        success: bool,
        received_responses: u32,
        expected_responses: u32,
    },
}

/// One ordered state change, broadcast to every subscriber of the
/// encounter including the issuing client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub encounter_id: EncounterId,
    /// Monotonic per encounter, starting at 1.
    pub sequence: u64,
    pub kind: DeltaKind,
    /// Warnings attached to a permitted intent (e.g. broken
    /// concentration).
    pub warnings: Vec<Warning>,
    pub timestamp: DateTime<Utc>,
}

impl DeltaEvent {
    pub fn new(encounter_id: EncounterId, sequence: u64, kind: DeltaKind) -> Self {
        Self {
            encounter_id,
            sequence,
            kind,
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings = warnings;
        self
    }
}
