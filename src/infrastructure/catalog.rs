//! In-memory Content Catalog adapter
//!
//! Read-only spell and monster reference data. The sample set covers the
//! casting-time, component, concentration, and scaling shapes the
//! validator exercises, so a demo server works out of the box.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::ports::outbound::{CatalogError, ContentCatalogPort, MonsterDefinition};
use crate::domain::entities::{
    EconomySlot, MaterialComponent, ScalingKind, SpellDefinition, SpellScaling,
};
use crate::domain::value_objects::{MonsterId, SpellId};

pub struct InMemoryContentCatalog {
    spells: HashMap<SpellId, SpellDefinition>,
    monsters: HashMap<MonsterId, MonsterDefinition>,
}

impl InMemoryContentCatalog {
    pub fn new() -> Self {
        Self {
            spells: HashMap::new(),
            monsters: HashMap::new(),
        }
    }

    pub fn with_spell(mut self, spell: SpellDefinition) -> Self {
        self.spells.insert(spell.id, spell);
        self
    }

    pub fn with_monster(mut self, monster: MonsterDefinition) -> Self {
        self.monsters.insert(monster.id, monster);
        self
    }

    /// A small SRD-flavored sample set.
    pub fn sample() -> Self {
        let fire_bolt = SpellDefinition::new("Fire Bolt", 0, "Evocation")
            .with_components(true, true);
        let magic_missile = SpellDefinition::new("Magic Missile", 1, "Evocation")
            .with_components(true, true)
            .with_scaling(SpellScaling {
                kind: ScalingKind::Linear,
                unit: "missile".to_string(),
                amount: 1,
            });
        let healing_word = SpellDefinition::new("Healing Word", 1, "Evocation")
            .with_casting_time(EconomySlot::BonusAction)
            .with_components(true, false)
            .with_scaling(SpellScaling {
                kind: ScalingKind::Linear,
                unit: "1d4".to_string(),
                amount: 1,
            });
        let shield = SpellDefinition::new("Shield", 1, "Abjuration")
            .with_casting_time(EconomySlot::Reaction)
            .with_components(true, true)
            .with_duration(1);
        let hold_person = SpellDefinition::new("Hold Person", 2, "Enchantment")
            .with_components(true, true)
            .with_material(MaterialComponent {
                description: "a small, straight piece of iron".to_string(),
                cost_gp: None,
                consumed: false,
            })
            .with_concentration(10)
            .with_scaling(SpellScaling {
                kind: ScalingKind::Linear,
                unit: "target".to_string(),
                amount: 1,
            });
        let fireball = SpellDefinition::new("Fireball", 3, "Evocation")
            .with_components(true, true)
            .with_material(MaterialComponent {
                description: "a tiny ball of bat guano and sulfur".to_string(),
                cost_gp: None,
                consumed: false,
            })
            .with_scaling(SpellScaling {
                kind: ScalingKind::Linear,
                unit: "1d6".to_string(),
                amount: 1,
            });
        let revivify = SpellDefinition::new("Revivify", 3, "Necromancy")
            .with_components(true, true)
            .with_material(MaterialComponent {
                description: "diamonds worth 300 gp".to_string(),
                cost_gp: Some(300),
                consumed: true,
            });

        let goblin = MonsterDefinition {
            id: MonsterId::new(),
            name: "Goblin".to_string(),
            armor_class: 15,
            hit_points: 7,
            attack_bonus: 4,
            dexterity_modifier: 2,
            passive_perception: 9,
        };
        let ogre = MonsterDefinition {
            id: MonsterId::new(),
            name: "Ogre".to_string(),
            armor_class: 11,
            hit_points: 59,
            attack_bonus: 6,
            dexterity_modifier: -1,
            passive_perception: 8,
        };

        Self::new()
            .with_spell(fire_bolt)
            .with_spell(magic_missile)
            .with_spell(healing_word)
            .with_spell(shield)
            .with_spell(hold_person)
            .with_spell(fireball)
            .with_spell(revivify)
            .with_monster(goblin)
            .with_monster(ogre)
    }
}

impl Default for InMemoryContentCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentCatalogPort for InMemoryContentCatalog {
    async fn get_spell(&self, spell_id: SpellId) -> Result<SpellDefinition, CatalogError> {
        self.spells
            .get(&spell_id)
            .cloned()
            .ok_or(CatalogError::SpellNotFound(spell_id))
    }

    async fn get_monster(
        &self,
        monster_id: MonsterId,
    ) -> Result<MonsterDefinition, CatalogError> {
        self.monsters
            .get(&monster_id)
            .cloned()
            .ok_or(CatalogError::MonsterNotFound(monster_id))
    }
}
