//! Encounter state aggregate - the authoritative store for one encounter
//!
//! Combines the turn scheduler, combatant roster, resource ledgers,
//! effect tracker, and pending save prompts under a single owner. All
//! mutation goes through the application layer's per-encounter
//! serialization; the aggregate itself is plain data plus invariant-
//! preserving operations, cloned wholesale for rollback and snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    Ability, Combatant, Effect, Encounter, EncounterStatus, InvalidTransition, SavePrompt,
    TargetScope, TurnAdvance,
};
use crate::domain::value_objects::{
    AdvantageMode, CharacterId, CombatantId, EffectId, EncounterId, PromptId, ResourceLedger,
};

/// Full authoritative state of one encounter. Also the snapshot payload
/// served on (re)connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterState {
    pub encounter: Encounter,
    pub combatants: HashMap<CombatantId, Combatant>,
    /// Resource pools per combatant. For character combatants this is a
    /// mirror of the Character Directory record.
    pub ledgers: HashMap<CombatantId, ResourceLedger>,
    pub effects: Vec<Effect>,
    pub prompts: HashMap<PromptId, SavePrompt>,
}

impl EncounterState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            encounter: Encounter::new(name),
            combatants: HashMap::new(),
            ledgers: HashMap::new(),
            effects: Vec::new(),
            prompts: HashMap::new(),
        }
    }

    pub fn id(&self) -> EncounterId {
        self.encounter.id
    }

    pub fn status(&self) -> EncounterStatus {
        self.encounter.status
    }

    pub fn round(&self) -> u32 {
        self.encounter.round
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.get_mut(&id)
    }

    pub fn ledger(&self, id: CombatantId) -> Option<&ResourceLedger> {
        self.ledgers.get(&id)
    }

    pub fn ledger_mut(&mut self, id: CombatantId) -> Option<&mut ResourceLedger> {
        self.ledgers.get_mut(&id)
    }

    /// Add a combatant with its ledger and initiative roll. Preparing
    /// only.
    pub fn add_combatant(
        &mut self,
        combatant: Combatant,
        ledger: ResourceLedger,
        initiative_roll: i32,
    ) -> Result<CombatantId, InvalidTransition> {
        self.encounter.add_entry(
            combatant.id,
            initiative_roll,
            combatant.dexterity_modifier,
            combatant.passive_perception,
        )?;
        let id = combatant.id;
        self.ledgers.insert(id, ledger);
        self.combatants.insert(id, combatant);
        Ok(id)
    }

    /// Start the encounter with fresh action economies all around.
    pub fn start(&mut self) -> Result<CombatantId, InvalidTransition> {
        let first = self.encounter.start()?;
        for combatant in self.combatants.values_mut() {
            combatant.economy.reset();
        }
        Ok(first)
    }

    pub fn pause(&mut self) -> Result<(), InvalidTransition> {
        self.encounter.pause()
    }

    pub fn resume(&mut self) -> Result<(), InvalidTransition> {
        self.encounter.resume()
    }

    pub fn end(&mut self) -> Result<(), InvalidTransition> {
        self.encounter.end()
    }

    /// Advance the turn. Resets the outgoing combatant's action economy
    /// so it is fresh when its turn next begins; on round wrap, expires
    /// timed effects and drops expired modifier tags.
    pub fn advance_turn(&mut self) -> Result<(TurnAdvance, Vec<EffectId>), InvalidTransition> {
        let advance = self.encounter.advance_turn()?;

        if let Some(combatant) = self.combatants.get_mut(&advance.previous) {
            combatant.economy.reset();
        }

        let mut expired = Vec::new();
        if advance.new_round {
            let round = self.encounter.round;
            expired = self
                .expire_effects(round)
                .into_iter()
                .map(|e| e.id)
                .collect();
            for combatant in self.combatants.values_mut() {
                combatant.clear_expired_modifiers(round);
            }
        }

        Ok((advance, expired))
    }

    /// Register an effect. When it requires concentration, any prior
    /// effect holding the same character's concentration is removed in
    /// the same operation; the two never coexist.
    pub fn register_effect(&mut self, effect: Effect) -> Option<Effect> {
        let replaced = match effect.concentrating_character_id {
            Some(caster) if effect.requires_concentration => {
                self.break_concentration(caster)
            }
            _ => None,
        };
        self.effects.push(effect);
        replaced
    }

    /// Remove and return the effect currently holding a character's
    /// concentration, if any.
    pub fn break_concentration(&mut self, character_id: CharacterId) -> Option<Effect> {
        let index = self
            .effects
            .iter()
            .position(|e| e.concentration_held_by(character_id))?;
        Some(self.effects.remove(index))
    }

    /// The effect holding a character's concentration, if any.
    pub fn concentration_of(&self, character_id: CharacterId) -> Option<&Effect> {
        self.effects
            .iter()
            .find(|e| e.concentration_held_by(character_id))
    }

    /// Remove all effects with `end_round <= round` and return them.
    pub fn expire_effects(&mut self, round: u32) -> Vec<Effect> {
        let (expired, kept): (Vec<Effect>, Vec<Effect>) = self
            .effects
            .drain(..)
            .partition(|e| e.is_expired(round));
        self.effects = kept;
        expired
    }

    pub fn end_effect(&mut self, effect_id: EffectId) -> Option<Effect> {
        let index = self.effects.iter().position(|e| e.id == effect_id)?;
        Some(self.effects.remove(index))
    }

    /// Issue a save prompt against the current roster.
    pub fn create_save_prompt(
        &mut self,
        ability: Ability,
        dc: i32,
        scope: TargetScope,
        advantage: AdvantageMode,
    ) -> SavePrompt {
        let prompt =
            SavePrompt::new(ability, dc, scope, self.combatants.len()).with_advantage(advantage);
        self.prompts.insert(prompt.id, prompt.clone());
        prompt
    }

    /// Record one response to a prompt; completed prompts are retired.
    pub fn record_save_response(&mut self, prompt_id: PromptId) -> Option<(u32, u32)> {
        let prompt = self.prompts.get_mut(&prompt_id)?;
        prompt.record_response();
        let counts = (prompt.received_responses, prompt.expected_responses);
        if prompt.is_complete() {
            self.prompts.remove(&prompt_id);
        }
        Some(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::HitPoints;
    use crate::domain::value_objects::MonsterId;

    fn monster(name: &str, dex: i32) -> Combatant {
        Combatant::monster(MonsterId::new(), name)
            .with_armor_class(13)
            .with_hit_points(HitPoints::full(11))
            .with_dexterity_modifier(dex)
    }

    fn two_combatant_state() -> (EncounterState, CombatantId, CombatantId) {
        let mut state = EncounterState::new("Test skirmish");
        let a = state
            .add_combatant(monster("A", 3), ResourceLedger::new(), 18)
            .unwrap();
        let b = state
            .add_combatant(monster("B", 1), ResourceLedger::new(), 18)
            .unwrap();
        (state, a, b)
    }

    #[test]
    fn test_tie_broken_by_dexterity_scenario() {
        let (mut state, a, _b) = two_combatant_state();
        let first = state.start().unwrap();
        assert_eq!(first, a);
    }

    #[test]
    fn test_advance_resets_outgoing_economy() {
        let (mut state, a, b) = two_combatant_state();
        state.start().unwrap();

        state
            .combatant_mut(a)
            .unwrap()
            .economy
            .mark_used(crate::domain::entities::EconomySlot::Action);

        let (advance, _) = state.advance_turn().unwrap();
        assert_eq!(advance.previous, a);
        assert_eq!(advance.next, b);
        assert!(!state.combatant(a).unwrap().economy.action_used);
    }

    #[test]
    fn test_round_wrap_expires_effects() {
        let (mut state, a, _b) = two_combatant_state();
        state.start().unwrap();

        let effect = Effect::new("Burning", a).ending_at(2);
        let effect_id = effect.id;
        state.register_effect(effect);
        state.register_effect(Effect::new("Mage Armor", a));

        // Round 1 -> 2: two advances wrap the two-entry order.
        state.advance_turn().unwrap();
        let (advance, expired) = state.advance_turn().unwrap();
        assert!(advance.new_round);
        assert_eq!(advance.round, 2);
        assert_eq!(expired, vec![effect_id]);
        assert_eq!(state.effects.len(), 1);
    }

    #[test]
    fn test_concentration_never_coexists() {
        let (mut state, a, _b) = two_combatant_state();
        let caster = CharacterId::new();

        let first = Effect::new("Hold Person", a).concentration_of(caster);
        let first_id = first.id;
        assert!(state.register_effect(first).is_none());

        let second = Effect::new("Haste", a).concentration_of(caster);
        let replaced = state.register_effect(second).unwrap();
        assert_eq!(replaced.id, first_id);

        let holding: Vec<&Effect> = state
            .effects
            .iter()
            .filter(|e| e.concentration_held_by(caster))
            .collect();
        assert_eq!(holding.len(), 1);
        assert_eq!(holding[0].name, "Haste");
    }

    #[test]
    fn test_concentration_is_per_character() {
        let (mut state, a, b) = two_combatant_state();
        let caster_one = CharacterId::new();
        let caster_two = CharacterId::new();

        state.register_effect(Effect::new("Bless", a).concentration_of(caster_one));
        let replaced =
            state.register_effect(Effect::new("Bane", b).concentration_of(caster_two));
        assert!(replaced.is_none());
        assert_eq!(state.effects.len(), 2);
    }

    #[test]
    fn test_save_prompt_lifecycle() {
        let (mut state, _a, _b) = two_combatant_state();
        let prompt_id = state
            .create_save_prompt(
                Ability::Dexterity,
                15,
                TargetScope::All,
                AdvantageMode::Normal,
            )
            .id;

        assert_eq!(state.record_save_response(prompt_id), Some((1, 2)));
        assert_eq!(state.record_save_response(prompt_id), Some((2, 2)));
        // Completed prompts are retired.
        assert_eq!(state.record_save_response(prompt_id), None);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let (state, _a, _b) = two_combatant_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: EncounterState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), state.id());
        assert_eq!(back.combatants.len(), 2);
    }
}
