//! Combatant entity - a participant in an encounter
//!
//! Combatants are polymorphic over characters and monsters. Hit points and
//! resources for character-type combatants are owned by the external
//! Character Directory; the engine holds a mirror that is only written
//! through the directory's optimistic-concurrency contract. Monster state
//! is engine-local.

use serde::{Deserialize, Serialize};

use crate::domain::entities::action_economy::ActionEconomy;
use crate::domain::value_objects::{
    resolve_advantage, AdvantageMode, CharacterId, CombatModifier, CombatantId, MonsterId,
};

/// Which directory a combatant's authoritative record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CombatantKind {
    /// Player character; hit points and resources live in the Character
    /// Directory under this id.
    Character { character_id: CharacterId },
    /// Monster from the Content Catalog; state is engine-local.
    Monster { monster_id: MonsterId },
}

/// Hit point block with temporary hit points absorbing damage first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub max: i32,
    pub temporary: i32,
}

impl HitPoints {
    pub fn full(max: i32) -> Self {
        Self {
            current: max,
            max,
            temporary: 0,
        }
    }

    /// Apply damage, draining temporary hit points before current.
    /// Current is floored at zero.
    pub fn apply_damage(mut self, amount: i32) -> Self {
        let amount = amount.max(0);
        let absorbed = self.temporary.min(amount);
        self.temporary -= absorbed;
        self.current = (self.current - (amount - absorbed)).max(0);
        self
    }

    /// Apply healing, capped at max. Temporary hit points are unaffected.
    pub fn apply_healing(mut self, amount: i32) -> Self {
        self.current = (self.current + amount.max(0)).min(self.max);
        self
    }

    pub fn is_down(&self) -> bool {
        self.current <= 0
    }
}

/// A participant in an encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub kind: CombatantKind,
    pub name: String,
    pub armor_class: i32,
    pub hit_points: HitPoints,
    pub attack_bonus: i32,
    /// Initiative tie-break keys.
    pub dexterity_modifier: i32,
    pub passive_perception: i32,
    /// Transient advantage/disadvantage/cover tags.
    pub modifiers: Vec<CombatModifier>,
    pub economy: ActionEconomy,
}

impl Combatant {
    pub fn character(character_id: CharacterId, name: impl Into<String>) -> Self {
        Self::new(CombatantKind::Character { character_id }, name)
    }

    pub fn monster(monster_id: MonsterId, name: impl Into<String>) -> Self {
        Self::new(CombatantKind::Monster { monster_id }, name)
    }

    fn new(kind: CombatantKind, name: impl Into<String>) -> Self {
        Self {
            id: CombatantId::new(),
            kind,
            name: name.into(),
            armor_class: 10,
            hit_points: HitPoints::full(1),
            attack_bonus: 0,
            dexterity_modifier: 0,
            passive_perception: 10,
            modifiers: Vec::new(),
            economy: ActionEconomy::new(),
        }
    }

    pub fn with_armor_class(mut self, armor_class: i32) -> Self {
        self.armor_class = armor_class;
        self
    }

    pub fn with_hit_points(mut self, hit_points: HitPoints) -> Self {
        self.hit_points = hit_points;
        self
    }

    pub fn with_attack_bonus(mut self, bonus: i32) -> Self {
        self.attack_bonus = bonus;
        self
    }

    pub fn with_dexterity_modifier(mut self, modifier: i32) -> Self {
        self.dexterity_modifier = modifier;
        self
    }

    pub fn with_passive_perception(mut self, passive: i32) -> Self {
        self.passive_perception = passive;
        self
    }

    /// The Character Directory id backing this combatant, if any.
    pub fn character_id(&self) -> Option<CharacterId> {
        match self.kind {
            CombatantKind::Character { character_id } => Some(character_id),
            CombatantKind::Monster { .. } => None,
        }
    }

    pub fn add_modifier(&mut self, modifier: CombatModifier) {
        self.modifiers.push(modifier);
    }

    /// Drop tags whose expiry round has passed.
    pub fn clear_expired_modifiers(&mut self, current_round: u32) {
        self.modifiers.retain(|m| !m.is_expired(current_round));
    }

    /// Net advantage mode from this combatant's own tags.
    pub fn advantage_mode(&self) -> AdvantageMode {
        resolve_advantage(&self.modifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ModifierKind;

    #[test]
    fn test_temporary_hp_absorbs_first() {
        let hp = HitPoints {
            current: 20,
            max: 20,
            temporary: 5,
        };
        let hp = hp.apply_damage(8);
        assert_eq!(hp.temporary, 0);
        assert_eq!(hp.current, 17);
    }

    #[test]
    fn test_damage_floors_at_zero() {
        let hp = HitPoints::full(10).apply_damage(25);
        assert_eq!(hp.current, 0);
        assert!(hp.is_down());
    }

    #[test]
    fn test_healing_caps_at_max() {
        let hp = HitPoints {
            current: 3,
            max: 10,
            temporary: 0,
        };
        let hp = hp.apply_healing(100);
        assert_eq!(hp.current, 10);
    }

    #[test]
    fn test_expired_modifiers_are_dropped() {
        let mut combatant = Combatant::monster(MonsterId::new(), "Goblin");
        combatant.add_modifier(
            CombatModifier::new(ModifierKind::Advantage, "Hidden").until_round(1),
        );
        combatant.add_modifier(CombatModifier::new(ModifierKind::CoverHalf, "Wall"));

        combatant.clear_expired_modifiers(2);
        assert_eq!(combatant.modifiers.len(), 1);
        assert_eq!(combatant.modifiers[0].kind, ModifierKind::CoverHalf);
    }

    #[test]
    fn test_character_id_accessor() {
        let character_id = CharacterId::new();
        let pc = Combatant::character(character_id, "Saria");
        assert_eq!(pc.character_id(), Some(character_id));

        let monster = Combatant::monster(MonsterId::new(), "Ogre");
        assert_eq!(monster.character_id(), None);
    }
}
