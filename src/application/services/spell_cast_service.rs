//! Spell cast validation and resolution
//!
//! Validation is staged and pure: it inspects the aggregate and produces
//! blockers (cast-preventing) and warnings (cast-permitted but flagged)
//! without touching state. Resolution runs only when no blockers remain
//! and applies every side effect - slot consumption, economy flags,
//! material cost, concentration transition, effect registration - in one
//! pass that cannot fail partway. The caller serializes both under the
//! per-encounter guard and rolls back by discarding the staged aggregate
//! on downstream failure.

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::EncounterState;
use crate::domain::entities::{Effect, SpellDefinition};
use crate::domain::errors::{Blocker, EngineError, Warning};
use crate::domain::value_objects::{CombatantId, EffectId, ResourceKind, SpellId};

/// Casting context for component checks. For characters these flags come
/// from the Character Directory record; monsters cast unencumbered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CasterContext {
    pub silenced: bool,
    pub free_hand: bool,
    pub has_focus: bool,
}

impl Default for CasterContext {
    fn default() -> Self {
        Self {
            silenced: false,
            free_hand: true,
            has_focus: true,
        }
    }
}

/// Outcome of the validation stages.
#[derive(Debug, Clone, Default)]
pub struct CastValidation {
    pub blockers: Vec<Blocker>,
    pub warnings: Vec<Warning>,
}

impl CastValidation {
    pub fn is_castable(&self) -> bool {
        self.blockers.is_empty()
    }
}

/// Record of a resolved cast, for the delta event and audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastOutcome {
    pub spell_id: SpellId,
    pub spell_name: String,
    pub cast_level: u8,
    /// Extra scaling units over the base cast.
    pub extra_units: u32,
    pub scaling_unit: Option<String>,
    /// Effect registered by this cast, if the spell leaves one.
    pub effect_id: Option<EffectId>,
    /// Concentration effect ended to make room for this one.
    pub broke_effect: Option<EffectId>,
}

/// Run the validation stages against current state. Never mutates.
pub fn validate_cast(
    state: &EncounterState,
    caster_id: CombatantId,
    context: &CasterContext,
    spell: &SpellDefinition,
    cast_level: u8,
) -> Result<CastValidation, EngineError> {
    let caster = state
        .combatant(caster_id)
        .ok_or(EngineError::CombatantNotFound(caster_id))?;
    let ledger = state
        .ledger(caster_id)
        .ok_or(EngineError::CombatantNotFound(caster_id))?;

    let mut validation = CastValidation::default();

    if !state.encounter.is_active() {
        validation.blockers.push(Blocker::EncounterNotActive {
            status: state.status(),
        });
        return Ok(validation);
    }

    // Stage 1: action economy.
    let slot = spell.casting_time;
    if caster.economy.is_used(slot) {
        validation.blockers.push(Blocker::EconomySlotUsed { slot });
    }
    if !spell.is_cantrip() && caster.economy.has_leveled_spell_this_turn {
        validation.blockers.push(Blocker::SecondLeveledSpell);
    }

    // Stage 2: concentration. Breaking the prior effect is permitted but
    // never silent.
    if spell.requires_concentration {
        if let Some(character_id) = caster.character_id() {
            if let Some(held) = state.concentration_of(character_id) {
                validation.warnings.push(Warning::ConcentrationBroken {
                    effect_id: held.id,
                    effect_name: held.name.clone(),
                });
            }
        }
    }

    // Stage 3: components.
    if spell.components.verbal && context.silenced {
        validation.blockers.push(Blocker::Silenced);
    }
    if spell.components.somatic && !context.free_hand {
        validation.blockers.push(Blocker::NoFreeHand);
    }
    if let Some(material) = &spell.material {
        match material.cost_gp {
            // Costed materials must actually be carried; the ledger's
            // currency pool stands in for them.
            Some(cost) => {
                let available = ledger.currency_gp();
                if available < cost {
                    validation.blockers.push(Blocker::InsufficientCurrency {
                        required_gp: cost,
                        available_gp: available,
                    });
                }
            }
            // Uncosted materials are covered by a pouch or focus.
            None => {
                if !context.has_focus {
                    validation
                        .blockers
                        .push(Blocker::MissingMaterial { cost_gp: 0 });
                }
            }
        }
    }

    // Stage 4: slot availability. Cantrips bypass slots entirely.
    if !spell.is_cantrip() {
        if cast_level < spell.level {
            validation.blockers.push(Blocker::CastLevelBelowBase {
                base_level: spell.level,
                requested_level: cast_level,
            });
        } else if ledger.available(&ResourceKind::slot(cast_level)) == 0 {
            validation
                .blockers
                .push(Blocker::NoSlotAvailable { level: cast_level });
        }
    }

    Ok(validation)
}

/// Apply a validated cast. Every mutation lands or the caller discards
/// the staged aggregate; there is no observable partial application.
pub fn resolve_cast(
    state: &mut EncounterState,
    caster_id: CombatantId,
    spell: &SpellDefinition,
    cast_level: u8,
) -> Result<CastOutcome, EngineError> {
    let round = state.round();

    // Slot consumption first; validation guaranteed availability.
    if !spell.is_cantrip() {
        let ledger = state
            .ledger_mut(caster_id)
            .ok_or(EngineError::CombatantNotFound(caster_id))?;
        ledger.consume(&ResourceKind::slot(cast_level), 1)?;
    }

    // Consumed material cost.
    if let Some(material) = &spell.material {
        if material.consumed {
            if let Some(cost) = material.cost_gp {
                let ledger = state
                    .ledger_mut(caster_id)
                    .ok_or(EngineError::CombatantNotFound(caster_id))?;
                ledger.consume(&ResourceKind::Currency, cost)?;
            }
        }
    }

    // Economy flags.
    let character_id = {
        let caster = state
            .combatant_mut(caster_id)
            .ok_or(EngineError::CombatantNotFound(caster_id))?;
        caster.economy.mark_used(spell.casting_time);
        if !spell.is_cantrip() {
            caster.economy.note_leveled_cast(spell.casting_time);
        }
        caster.character_id()
    };

    // Concentration transition and effect registration.
    let mut effect_id = None;
    let mut broke_effect = None;
    if spell.requires_concentration || spell.duration_rounds.is_some() {
        let mut effect = Effect::new(spell.name.clone(), caster_id);
        if let Some(duration) = spell.duration_rounds {
            effect = effect.ending_at(round + duration);
        }
        if spell.requires_concentration {
            if let Some(character_id) = character_id {
                effect = effect.concentration_of(character_id);
            }
        }
        effect_id = Some(effect.id);
        broke_effect = state.register_effect(effect).map(|prior| prior.id);
    }

    Ok(CastOutcome {
        spell_id: spell.id,
        spell_name: spell.name.clone(),
        cast_level,
        extra_units: spell.extra_units_at(cast_level),
        scaling_unit: spell.scaling.as_ref().map(|s| s.unit.clone()),
        effect_id,
        broke_effect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        Combatant, EconomySlot, HitPoints, MaterialComponent, ScalingKind, SpellScaling,
    };
    use crate::domain::value_objects::{
        CharacterId, ResourceLedger, ResourcePool,
    };

    fn caster_state(ledger: ResourceLedger) -> (EncounterState, CombatantId, CharacterId) {
        let mut state = EncounterState::new("Spell test");
        let character_id = CharacterId::new();
        let caster = Combatant::character(character_id, "Mirelle")
            .with_armor_class(12)
            .with_hit_points(HitPoints::full(18));
        let caster_id = state.add_combatant(caster, ledger, 15).unwrap();
        state.start().unwrap();
        (state, caster_id, character_id)
    }

    fn leveled_spell(level: u8) -> SpellDefinition {
        SpellDefinition::new("Scorching Ray", level, "Evocation").with_components(true, true)
    }

    #[test]
    fn test_happy_path_cast_consumes_slot() {
        let (mut state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(1, 1));
        let spell = leveled_spell(1);

        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &spell,
            1,
        )
        .unwrap();
        assert!(validation.is_castable());

        resolve_cast(&mut state, caster_id, &spell, 1).unwrap();
        let slot = &state.ledger(caster_id).unwrap().spell_slots()[0];
        assert_eq!(slot.used, 1);
    }

    #[test]
    fn test_second_cast_blocked_by_empty_slots() {
        let (mut state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(1, 1));
        let spell = leveled_spell(1);
        resolve_cast(&mut state, caster_id, &spell, 1).unwrap();

        // A fresh turn restores the economy but not the slot.
        state.combatant_mut(caster_id).unwrap().economy.reset();

        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &spell,
            1,
        )
        .unwrap();
        assert_eq!(
            validation.blockers,
            vec![Blocker::NoSlotAvailable { level: 1 }]
        );
    }

    #[test]
    fn test_second_leveled_spell_blocked_regardless_of_slot_category() {
        let (mut state, caster_id, _) = caster_state(
            ResourceLedger::new().with_slots(1, 4),
        );
        let action_spell = leveled_spell(1);
        resolve_cast(&mut state, caster_id, &action_spell, 1).unwrap();

        // Even through an unused bonus-action slot, a second leveled
        // spell this turn is blocked.
        let bonus_spell = SpellDefinition::new("Healing Word", 1, "Evocation")
            .with_casting_time(EconomySlot::BonusAction);
        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &bonus_spell,
            1,
        )
        .unwrap();
        assert!(validation
            .blockers
            .contains(&Blocker::SecondLeveledSpell));
    }

    #[test]
    fn test_cantrip_allowed_after_leveled_spell() {
        let (mut state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(1, 2));
        let spell = SpellDefinition::new("Healing Word", 1, "Evocation")
            .with_casting_time(EconomySlot::BonusAction);
        resolve_cast(&mut state, caster_id, &spell, 1).unwrap();

        let cantrip = SpellDefinition::new("Fire Bolt", 0, "Evocation");
        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &cantrip,
            0,
        )
        .unwrap();
        assert!(validation.is_castable());
    }

    #[test]
    fn test_used_action_blocks_action_spell() {
        let (mut state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(1, 2));
        state
            .combatant_mut(caster_id)
            .unwrap()
            .economy
            .mark_used(EconomySlot::Action);

        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &leveled_spell(1),
            1,
        )
        .unwrap();
        assert!(validation.blockers.contains(&Blocker::EconomySlotUsed {
            slot: EconomySlot::Action
        }));
    }

    #[test]
    fn test_silence_blocks_verbal_spell() {
        let (state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(1, 2));
        let context = CasterContext {
            silenced: true,
            ..CasterContext::default()
        };
        let validation =
            validate_cast(&state, caster_id, &context, &leveled_spell(1), 1).unwrap();
        assert!(validation.blockers.contains(&Blocker::Silenced));
    }

    #[test]
    fn test_somatic_needs_a_free_hand() {
        let (state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(1, 2));
        let context = CasterContext {
            free_hand: false,
            ..CasterContext::default()
        };
        let validation =
            validate_cast(&state, caster_id, &context, &leveled_spell(1), 1).unwrap();
        assert!(validation.blockers.contains(&Blocker::NoFreeHand));
    }

    #[test]
    fn test_costed_material_requires_currency() {
        let ledger = ResourceLedger::new().with_slots(3, 1).with_pool(
            ResourceKind::Currency,
            ResourcePool::new(100),
        );
        let (mut state, caster_id, _) = caster_state(ledger);
        let spell = SpellDefinition::new("Revivify", 3, "Necromancy").with_material(
            MaterialComponent {
                description: "diamonds worth 300 gp".to_string(),
                cost_gp: Some(300),
                consumed: true,
            },
        );

        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &spell,
            3,
        )
        .unwrap();
        assert_eq!(
            validation.blockers,
            vec![Blocker::InsufficientCurrency {
                required_gp: 300,
                available_gp: 100,
            }]
        );

        // With enough gold the cast resolves and the cost is deducted.
        let rich = ResourceLedger::new().with_slots(3, 1).with_pool(
            ResourceKind::Currency,
            ResourcePool::new(500),
        );
        *state.ledger_mut(caster_id).unwrap() = rich;
        resolve_cast(&mut state, caster_id, &spell, 3).unwrap();
        assert_eq!(state.ledger(caster_id).unwrap().currency_gp(), 200);
    }

    #[test]
    fn test_uncosted_material_needs_focus() {
        let (state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(1, 2));
        let spell = SpellDefinition::new("Sleep", 1, "Enchantment").with_material(
            MaterialComponent {
                description: "a pinch of fine sand".to_string(),
                cost_gp: None,
                consumed: false,
            },
        );

        let context = CasterContext {
            has_focus: false,
            ..CasterContext::default()
        };
        let validation = validate_cast(&state, caster_id, &context, &spell, 1).unwrap();
        assert!(validation
            .blockers
            .contains(&Blocker::MissingMaterial { cost_gp: 0 }));

        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &spell,
            1,
        )
        .unwrap();
        assert!(validation.is_castable());
    }

    #[test]
    fn test_upcast_below_base_level_is_blocked() {
        let (state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(2, 2));
        let spell = leveled_spell(3);
        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &spell,
            2,
        )
        .unwrap();
        assert!(validation.blockers.contains(&Blocker::CastLevelBelowBase {
            base_level: 3,
            requested_level: 2,
        }));
    }

    #[test]
    fn test_upcast_scaling_is_computed() {
        let (mut state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(3, 1));
        let spell = SpellDefinition::new("Fireball", 3, "Evocation").with_scaling(
            SpellScaling {
                kind: ScalingKind::Linear,
                unit: "1d6".to_string(),
                amount: 1,
            },
        );

        let outcome = resolve_cast(&mut state, caster_id, &spell, 3).unwrap();
        assert_eq!(outcome.extra_units, 0);

        // Reset for an upcast at 5th.
        let (mut state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(5, 1));
        let outcome = resolve_cast(&mut state, caster_id, &spell, 5).unwrap();
        assert_eq!(outcome.extra_units, 2);
        assert_eq!(outcome.scaling_unit.as_deref(), Some("1d6"));
    }

    #[test]
    fn test_concentration_swap_warns_and_replaces() {
        let (mut state, caster_id, character_id) =
            caster_state(ResourceLedger::new().with_slots(2, 3));

        let hold = SpellDefinition::new("Hold Person", 2, "Enchantment")
            .with_concentration(10);
        let outcome = resolve_cast(&mut state, caster_id, &hold, 2).unwrap();
        let first_effect = outcome.effect_id.unwrap();
        assert!(outcome.broke_effect.is_none());

        // Fresh turn so economy does not block the second cast.
        state.combatant_mut(caster_id).unwrap().economy.reset();

        let invisibility = SpellDefinition::new("Invisibility", 2, "Illusion")
            .with_concentration(600);
        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &invisibility,
            2,
        )
        .unwrap();
        assert!(validation.is_castable());
        assert_eq!(
            validation.warnings,
            vec![Warning::ConcentrationBroken {
                effect_id: first_effect,
                effect_name: "Hold Person".to_string(),
            }]
        );

        let outcome = resolve_cast(&mut state, caster_id, &invisibility, 2).unwrap();
        assert_eq!(outcome.broke_effect, Some(first_effect));
        assert!(state.concentration_of(character_id).is_some());
        assert_eq!(
            state.concentration_of(character_id).unwrap().name,
            "Invisibility"
        );
        assert_eq!(state.effects.len(), 1);
    }

    #[test]
    fn test_validation_never_mutates() {
        let (state, caster_id, _) = caster_state(ResourceLedger::new().with_slots(1, 1));
        let before = serde_json::to_string(&state).unwrap();
        let _ = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &leveled_spell(1),
            1,
        )
        .unwrap();
        let after = serde_json::to_string(&state).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_inactive_encounter_blocks_casting() {
        let mut state = EncounterState::new("Not started");
        let caster = Combatant::character(CharacterId::new(), "Mirelle");
        let caster_id = state
            .add_combatant(caster, ResourceLedger::new().with_slots(1, 2), 10)
            .unwrap();

        let validation = validate_cast(
            &state,
            caster_id,
            &CasterContext::default(),
            &leveled_spell(1),
            1,
        )
        .unwrap();
        assert!(matches!(
            validation.blockers[0],
            Blocker::EncounterNotActive { .. }
        ));
    }
}
