//! Value objects - Immutable objects defined by their attributes

mod attack;
mod dice;
mod ids;
mod modifiers;
mod resources;

pub use attack::{resolve_attack, AttackOutcome, FullCoverError};
pub use dice::{DiceRoller, RandomRoller, SequenceRoller};
pub use ids::*;
pub use modifiers::{
    resolve_advantage, resolve_cover, AdvantageMode, CombatModifier, CoverTier, ModifierKind,
};
pub use resources::{
    ResourceError, ResourceKind, ResourceLedger, ResourcePool, RestKind, SpellSlot,
};
