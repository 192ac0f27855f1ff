//! Timed effects and the single-concentration-per-caster rule

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{CharacterId, CombatantId, EffectId};

/// A timed effect on a combatant.
///
/// Invariant (enforced by the encounter aggregate): at most one active
/// effect per character may require concentration with that character as
/// `concentrating_character_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    pub id: EffectId,
    pub name: String,
    /// Combatant the effect applies to.
    pub owner: CombatantId,
    /// Round after which the effect expires; `None` lasts until removed.
    pub end_round: Option<u32>,
    pub requires_concentration: bool,
    /// Caster holding concentration on this effect, if any.
    pub concentrating_character_id: Option<CharacterId>,
}

impl Effect {
    pub fn new(name: impl Into<String>, owner: CombatantId) -> Self {
        Self {
            id: EffectId::new(),
            name: name.into(),
            owner,
            end_round: None,
            requires_concentration: false,
            concentrating_character_id: None,
        }
    }

    pub fn ending_at(mut self, round: u32) -> Self {
        self.end_round = Some(round);
        self
    }

    pub fn concentration_of(mut self, character_id: CharacterId) -> Self {
        self.requires_concentration = true;
        self.concentrating_character_id = Some(character_id);
        self
    }

    pub fn is_expired(&self, current_round: u32) -> bool {
        self.end_round.map(|r| r <= current_round).unwrap_or(false)
    }

    /// True when this effect holds the given character's concentration.
    pub fn concentration_held_by(&self, character_id: CharacterId) -> bool {
        self.requires_concentration
            && self.concentrating_character_id == Some(character_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_inclusive() {
        let effect = Effect::new("Bless", CombatantId::new()).ending_at(3);
        assert!(!effect.is_expired(2));
        assert!(effect.is_expired(3));
        assert!(effect.is_expired(4));
    }

    #[test]
    fn test_unbounded_effect_never_expires() {
        let effect = Effect::new("Mage Armor", CombatantId::new());
        assert!(!effect.is_expired(u32::MAX));
    }

    #[test]
    fn test_concentration_ownership() {
        let caster = CharacterId::new();
        let other = CharacterId::new();
        let effect =
            Effect::new("Hold Person", CombatantId::new()).concentration_of(caster);
        assert!(effect.concentration_held_by(caster));
        assert!(!effect.concentration_held_by(other));

        let plain = Effect::new("Shield of Faith token", CombatantId::new());
        assert!(!plain.concentration_held_by(caster));
    }
}
