//! Engine error taxonomy
//!
//! Blockers and warnings are enumerable, serializable reasons so clients
//! render consistent messaging and tests assert on reason codes rather
//! than strings.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{EconomySlot, EncounterStatus, InvalidTransition};
use crate::domain::value_objects::{
    CombatantId, EffectId, EncounterId, PromptId, ResourceError, SpellId,
};

/// Rule violation that prevents an intent. Surfaced to the initiating
/// client only; no state change, no broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Blocker {
    /// The required economy slot was already spent this turn.
    EconomySlotUsed { slot: EconomySlot },
    /// A leveled spell was already cast this turn.
    SecondLeveledSpell,
    /// Verbal component while the caster is silenced.
    Silenced,
    /// Somatic component with no free hand.
    NoFreeHand,
    /// Costed material component with neither focus nor material on hand.
    MissingMaterial { cost_gp: u32 },
    /// Consumed material costs more than the caster carries.
    InsufficientCurrency { required_gp: u32, available_gp: u32 },
    /// No slot with remaining uses at the chosen cast level.
    NoSlotAvailable { level: u8 },
    /// Chosen cast level is below the spell's base level.
    CastLevelBelowBase { base_level: u8, requested_level: u8 },
    /// Target behind full cover cannot be attacked.
    FullCoverTarget,
    /// The encounter is not accepting combat intents.
    EncounterNotActive { status: EncounterStatus },
}

/// Notable side condition on a permitted intent. Attached to the
/// resulting delta event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Warning {
    /// Casting the new spell ended an existing concentration effect.
    ConcentrationBroken {
        effect_id: EffectId,
        effect_name: String,
    },
}

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("intent blocked: {0:?}")]
    Blocked(Vec<Blocker>),

    /// Optimistic version mismatch against an externally-owned resource,
    /// retries exhausted. Retryable by the caller.
    #[error("conflicting update on an externally-owned record after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// The store write failed; in-memory state was not advanced and no
    /// delta was broadcast. Retryable by the caller.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Timed out waiting for the per-encounter serialization slot.
    /// Retryable by the caller.
    #[error("timed out acquiring the encounter lock")]
    LockTimeout,

    #[error("{0}")]
    InvalidLifecycle(#[from] InvalidTransition),

    #[error("encounter {0} not found")]
    EncounterNotFound(EncounterId),

    #[error("combatant {0} not found")]
    CombatantNotFound(CombatantId),

    #[error("spell {0} not found")]
    SpellNotFound(SpellId),

    #[error("save prompt {0} not found")]
    PromptNotFound(PromptId),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The Character Directory could not serve a read.
    #[error("character directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

impl EngineError {
    /// Whether the caller may retry the same intent unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Persistence(_) | Self::LockTimeout
        )
    }

    /// Stable code string for the wire protocol.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Blocked(_) => "INTENT_BLOCKED",
            Self::Conflict { .. } => "CONCURRENCY_CONFLICT",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
            Self::LockTimeout => "LOCK_TIMEOUT",
            Self::InvalidLifecycle(_) => "INVALID_LIFECYCLE",
            Self::EncounterNotFound(_) => "ENCOUNTER_NOT_FOUND",
            Self::CombatantNotFound(_) => "COMBATANT_NOT_FOUND",
            Self::SpellNotFound(_) => "SPELL_NOT_FOUND",
            Self::PromptNotFound(_) => "PROMPT_NOT_FOUND",
            Self::Resource(ResourceError::InsufficientResource) => "INSUFFICIENT_RESOURCE",
            Self::Resource(ResourceError::AtCapacity) => "AT_CAPACITY",
            Self::Resource(ResourceError::UnknownResource) => "UNKNOWN_RESOURCE",
            Self::DirectoryUnavailable(_) => "DIRECTORY_UNAVAILABLE",
        }
    }
}
