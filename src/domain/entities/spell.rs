//! Spell definitions - read-only reference data from the Content Catalog

use serde::{Deserialize, Serialize};

use crate::domain::entities::action_economy::EconomySlot;
use crate::domain::value_objects::SpellId;

/// Material component requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialComponent {
    pub description: String,
    /// Gold cost when the material is specific and priced; components
    /// without a listed cost are covered by a pouch or focus.
    pub cost_gp: Option<u32>,
    /// Costed materials marked consumed are deducted on resolution.
    pub consumed: bool,
}

/// Component requirements for a casting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Components {
    pub verbal: bool,
    pub somatic: bool,
    pub material: bool,
}

/// Upcast scaling shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScalingKind {
    /// `amount` extra units per slot level above base.
    Linear,
    /// `amount` extra units per `step` whole slot levels above base.
    Step { step: u8 },
}

/// Declared upcast scaling, e.g. "+1d6 per slot level above base".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellScaling {
    pub kind: ScalingKind,
    /// The unit being scaled ("1d6", "missile", "target").
    pub unit: String,
    /// Units gained per scaling increment.
    pub amount: u32,
}

impl SpellScaling {
    /// Extra units gained by casting at `cast_level` with the given base.
    pub fn extra_units(&self, base_level: u8, cast_level: u8) -> u32 {
        if cast_level <= base_level {
            return 0;
        }
        let levels_above = u32::from(cast_level - base_level);
        match self.kind {
            ScalingKind::Linear => self.amount * levels_above,
            ScalingKind::Step { step } => {
                if step == 0 {
                    0
                } else {
                    self.amount * (levels_above / u32::from(step))
                }
            }
        }
    }
}

/// A spell as published in the Content Catalog. Never mutated by the
/// engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellDefinition {
    pub id: SpellId,
    pub name: String,
    /// Base slot level; 0 is a cantrip.
    pub level: u8,
    pub school: String,
    pub casting_time: EconomySlot,
    pub components: Components,
    pub material: Option<MaterialComponent>,
    pub requires_concentration: bool,
    /// Duration in rounds for timed effects; `None` is instantaneous.
    pub duration_rounds: Option<u32>,
    pub scaling: Option<SpellScaling>,
}

impl SpellDefinition {
    pub fn new(name: impl Into<String>, level: u8, school: impl Into<String>) -> Self {
        Self {
            id: SpellId::new(),
            name: name.into(),
            level,
            school: school.into(),
            casting_time: EconomySlot::Action,
            components: Components::default(),
            material: None,
            requires_concentration: false,
            duration_rounds: None,
            scaling: None,
        }
    }

    pub fn with_casting_time(mut self, slot: EconomySlot) -> Self {
        self.casting_time = slot;
        self
    }

    pub fn with_components(mut self, verbal: bool, somatic: bool) -> Self {
        self.components.verbal = verbal;
        self.components.somatic = somatic;
        self
    }

    pub fn with_material(mut self, material: MaterialComponent) -> Self {
        self.components.material = true;
        self.material = Some(material);
        self
    }

    pub fn with_concentration(mut self, duration_rounds: u32) -> Self {
        self.requires_concentration = true;
        self.duration_rounds = Some(duration_rounds);
        self
    }

    pub fn with_duration(mut self, duration_rounds: u32) -> Self {
        self.duration_rounds = Some(duration_rounds);
        self
    }

    pub fn with_scaling(mut self, scaling: SpellScaling) -> Self {
        self.scaling = Some(scaling);
        self
    }

    pub fn is_cantrip(&self) -> bool {
        self.level == 0
    }

    /// Total extra scaling units at the given cast level.
    pub fn extra_units_at(&self, cast_level: u8) -> u32 {
        self.scaling
            .as_ref()
            .map(|s| s.extra_units(self.level, cast_level))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_scaling() {
        // "+1d6 per slot level above base", base level 1.
        let scaling = SpellScaling {
            kind: ScalingKind::Linear,
            unit: "1d6".to_string(),
            amount: 1,
        };
        assert_eq!(scaling.extra_units(1, 1), 0);
        assert_eq!(scaling.extra_units(1, 3), 2);
        assert_eq!(scaling.extra_units(1, 5), 4);
    }

    #[test]
    fn test_step_scaling() {
        // "+1 unit per 2 slot levels above base", base level 3.
        let scaling = SpellScaling {
            kind: ScalingKind::Step { step: 2 },
            unit: "target".to_string(),
            amount: 1,
        };
        assert_eq!(scaling.extra_units(3, 4), 0);
        assert_eq!(scaling.extra_units(3, 5), 1);
        assert_eq!(scaling.extra_units(3, 7), 2);
    }

    #[test]
    fn test_downcast_yields_no_scaling() {
        let scaling = SpellScaling {
            kind: ScalingKind::Linear,
            unit: "1d8".to_string(),
            amount: 2,
        };
        assert_eq!(scaling.extra_units(3, 2), 0);
    }

    #[test]
    fn test_cantrip_detection() {
        let cantrip = SpellDefinition::new("Fire Bolt", 0, "Evocation");
        assert!(cantrip.is_cantrip());
        let leveled = SpellDefinition::new("Magic Missile", 1, "Evocation");
        assert!(!leveled.is_cantrip());
    }

    #[test]
    fn test_material_flag_follows_component() {
        let spell = SpellDefinition::new("Revivify", 3, "Necromancy").with_material(
            MaterialComponent {
                description: "diamonds worth 300 gp".to_string(),
                cost_gp: Some(300),
                consumed: true,
            },
        );
        assert!(spell.components.material);
        assert_eq!(spell.material.as_ref().unwrap().cost_gp, Some(300));
    }
}
