//! Encounter service - the engine surface
//!
//! Owns the in-memory authoritative state per encounter and orchestrates
//! every intent: serialize through the concurrency guard, validate
//! against a staged clone of the aggregate, reconcile externally-owned
//! character records through optimistic writes, persist the delta, then
//! commit the staged state and fan the delta out. A failed persist or an
//! exhausted directory retry discards the staged clone, so no
//! half-applied state is ever observable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::application::dto::AddCombatantSpec;
use crate::application::ports::outbound::{
    CharacterDirectoryPort, CombatantPatch, CombatantRecord, ContentCatalogPort,
    DirectoryWriteOutcome, EncounterStorePort,
};
use crate::application::services::encounter_guard::ConcurrencyGuard;
use crate::application::services::spell_cast_service::{
    resolve_cast, validate_cast, CastOutcome, CasterContext,
};
use crate::domain::aggregates::EncounterState;
use crate::domain::entities::{
    Ability, Combatant, CombatantKind, EncounterStatus, HitPoints, TargetScope,
};
use crate::domain::errors::{Blocker, EngineError, Warning};
use crate::domain::events::{DeltaEvent, DeltaKind};
use crate::domain::value_objects::{
    resolve_attack, resolve_cover, AdvantageMode, CharacterId, CombatModifier, CombatantId,
    CoverTier, DiceRoller, EncounterId, PromptId, RandomRoller, RestKind, SpellId,
};
use crate::infrastructure::hub::EncounterHub;

/// Default bound on directory read-validate-write retries.
const DEFAULT_RETRY_LIMIT: u32 = 3;

/// The higher of two cover tiers.
fn strongest_cover(a: CoverTier, b: CoverTier) -> CoverTier {
    fn rank(tier: CoverTier) -> u8 {
        match tier {
            CoverTier::None => 0,
            CoverTier::Half => 1,
            CoverTier::ThreeQuarters => 2,
            CoverTier::Full => 3,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

/// The authoritative engine for all encounters on this server.
pub struct EncounterService {
    states: RwLock<HashMap<EncounterId, EncounterState>>,
    guard: ConcurrencyGuard,
    directory: Arc<dyn CharacterDirectoryPort>,
    catalog: Arc<dyn ContentCatalogPort>,
    store: Arc<dyn EncounterStorePort>,
    hub: Arc<EncounterHub>,
    roller: Mutex<Box<dyn DiceRoller>>,
    retry_limit: u32,
}

impl EncounterService {
    pub fn new(
        directory: Arc<dyn CharacterDirectoryPort>,
        catalog: Arc<dyn ContentCatalogPort>,
        store: Arc<dyn EncounterStorePort>,
        hub: Arc<EncounterHub>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            guard: ConcurrencyGuard::new(lock_timeout),
            directory,
            catalog,
            store,
            hub,
            roller: Mutex::new(Box::new(RandomRoller::new())),
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }

    /// Swap the dice roller; used for seeded replays and tests.
    pub fn with_roller(mut self, roller: Box<dyn DiceRoller>) -> Self {
        self.roller = Mutex::new(roller);
        self
    }

    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    pub fn hub(&self) -> &Arc<EncounterHub> {
        &self.hub
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create an encounter in `Preparing` and open its delta channel.
    pub async fn create_encounter(&self, name: &str) -> EncounterId {
        let state = EncounterState::new(name);
        let encounter_id = state.id();
        self.states.write().await.insert(encounter_id, state);
        self.hub.open_channel(encounter_id).await;
        tracing::info!("Created encounter {} ({})", encounter_id, name);
        encounter_id
    }

    /// Add a combatant while preparing, seeding stats from the directory
    /// or catalog.
    pub async fn add_combatant(
        &self,
        encounter_id: EncounterId,
        spec: AddCombatantSpec,
    ) -> Result<DeltaEvent, EngineError> {
        // External reads happen before the critical section.
        let (mut combatant, ledger) = match spec.kind {
            CombatantKind::Character { character_id } => {
                let record = self.fetch_record(character_id).await?;
                let combatant = Combatant::character(character_id, spec.name.clone())
                    .with_hit_points(record.hit_points);
                (combatant, record.ledger)
            }
            CombatantKind::Monster { monster_id } => {
                let definition = self
                    .catalog
                    .get_monster(monster_id)
                    .await
                    .map_err(|e| EngineError::DirectoryUnavailable(e.to_string()))?;
                let combatant = Combatant::monster(monster_id, spec.name.clone())
                    .with_armor_class(definition.armor_class)
                    .with_hit_points(HitPoints::full(definition.hit_points))
                    .with_attack_bonus(definition.attack_bonus)
                    .with_dexterity_modifier(definition.dexterity_modifier)
                    .with_passive_perception(definition.passive_perception);
                (combatant, spec.ledger.clone().unwrap_or_default())
            }
        };
        if let Some(armor_class) = spec.armor_class {
            combatant.armor_class = armor_class;
        }
        if let Some(attack_bonus) = spec.attack_bonus {
            combatant.attack_bonus = attack_bonus;
        }
        if let Some(dexterity_modifier) = spec.dexterity_modifier {
            combatant.dexterity_modifier = dexterity_modifier;
        }
        if let Some(passive_perception) = spec.passive_perception {
            combatant.passive_perception = passive_perception;
        }

        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        let combatant_id = staged.add_combatant(combatant, ledger, spec.initiative_roll)?;
        self.commit(
            staged,
            DeltaKind::CombatantAdded {
                combatant_id,
                name: spec.name,
                initiative_roll: spec.initiative_roll,
            },
            Vec::new(),
        )
        .await
    }

    pub async fn start_encounter(
        &self,
        encounter_id: EncounterId,
    ) -> Result<DeltaEvent, EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        let first_combatant = staged.start()?;
        let round = staged.round();
        self.commit(
            staged,
            DeltaKind::EncounterStarted {
                round,
                first_combatant,
            },
            Vec::new(),
        )
        .await
    }

    pub async fn pause_encounter(
        &self,
        encounter_id: EncounterId,
    ) -> Result<DeltaEvent, EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        staged.pause()?;
        self.commit(staged, DeltaKind::EncounterPaused, Vec::new())
            .await
    }

    pub async fn resume_encounter(
        &self,
        encounter_id: EncounterId,
    ) -> Result<DeltaEvent, EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        staged.resume()?;
        self.commit(staged, DeltaKind::EncounterResumed, Vec::new())
            .await
    }

    pub async fn end_encounter(
        &self,
        encounter_id: EncounterId,
    ) -> Result<DeltaEvent, EngineError> {
        let event = {
            let _slot = self.guard.acquire(encounter_id).await?;
            let mut staged = self.staged(encounter_id).await?;
            staged.end()?;
            self.commit(staged, DeltaKind::EncounterEnded, Vec::new())
                .await?
        };
        self.guard.remove(encounter_id).await;
        Ok(event)
    }

    pub async fn advance_turn(
        &self,
        encounter_id: EncounterId,
    ) -> Result<DeltaEvent, EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        let (advance, expired_effects) = staged.advance_turn()?;
        self.commit(
            staged,
            DeltaKind::TurnAdvanced {
                round: advance.round,
                new_round: advance.new_round,
                previous_combatant: advance.previous,
                active_combatant: advance.next,
                expired_effects,
            },
            Vec::new(),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Combat intents
    // ------------------------------------------------------------------

    /// Resolve a to-hit roll. No state mutation; the outcome rides the
    /// delta stream and damage application is a separate intent.
    pub async fn roll_attack(
        &self,
        encounter_id: EncounterId,
        attacker_id: CombatantId,
        target_id: Option<CombatantId>,
        target_ac: i32,
        requested_mode: AdvantageMode,
        cover: CoverTier,
    ) -> Result<DeltaEvent, EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let staged = self.staged(encounter_id).await?;

        if !staged.encounter.is_active() {
            return Err(EngineError::Blocked(vec![Blocker::EncounterNotActive {
                status: staged.status(),
            }]));
        }
        let attacker = staged
            .combatant(attacker_id)
            .ok_or(EngineError::CombatantNotFound(attacker_id))?;

        // A named target contributes its own cover tags; the stronger
        // tier wins.
        let cover = match target_id {
            Some(target_id) => {
                let target = staged
                    .combatant(target_id)
                    .ok_or(EngineError::CombatantNotFound(target_id))?;
                strongest_cover(cover, resolve_cover(&target.modifiers))
            }
            None => cover,
        };

        // Full cover is a precondition failure: rejected before a die is
        // drawn.
        if !cover.allows_targeting() {
            return Err(EngineError::Blocked(vec![Blocker::FullCoverTarget]));
        }

        // The attacker's own tags combine with the requested mode.
        let mode = attacker.advantage_mode().combine(requested_mode);
        let attack_bonus = attacker.attack_bonus;

        let outcome = {
            let mut roller = self.roller.lock().await;
            resolve_attack(attack_bonus, target_ac, mode, cover, roller.as_mut())
                .map_err(|_| EngineError::Blocked(vec![Blocker::FullCoverTarget]))?
        };

        self.commit(
            staged,
            DeltaKind::AttackResolved {
                attacker: attacker_id,
                target_ac,
                outcome,
            },
            Vec::new(),
        )
        .await
    }

    /// Validate and resolve a spell cast atomically.
    pub async fn cast_spell(
        &self,
        encounter_id: EncounterId,
        caster_id: CombatantId,
        spell_id: SpellId,
        cast_level: u8,
    ) -> Result<(DeltaEvent, CastOutcome), EngineError> {
        let spell = self
            .catalog
            .get_spell(spell_id)
            .await
            .map_err(|_| EngineError::SpellNotFound(spell_id))?;

        // Directory read happens before the critical section.
        let character_id = {
            let states = self.states.read().await;
            let state = states
                .get(&encounter_id)
                .ok_or(EngineError::EncounterNotFound(encounter_id))?;
            state
                .combatant(caster_id)
                .ok_or(EngineError::CombatantNotFound(caster_id))?
                .character_id()
        };
        let mut record = match character_id {
            Some(character_id) => Some(self.fetch_record(character_id).await?),
            None => None,
        };

        let _slot = self.guard.acquire(encounter_id).await?;

        let mut attempts = 0u32;
        let (staged, outcome, warnings) = loop {
            let mut staged = self.staged(encounter_id).await?;

            // Adopt the directory's ledger as the validation baseline.
            let context = match &record {
                Some(record) => {
                    if let Some(ledger) = staged.ledger_mut(caster_id) {
                        *ledger = record.ledger.clone();
                    }
                    CasterContext {
                        silenced: record.silenced,
                        free_hand: record.free_hand,
                        has_focus: record.has_focus,
                    }
                }
                None => CasterContext::default(),
            };

            let validation = validate_cast(&staged, caster_id, &context, &spell, cast_level)?;
            if !validation.is_castable() {
                return Err(EngineError::Blocked(validation.blockers));
            }

            let outcome = resolve_cast(&mut staged, caster_id, &spell, cast_level)?;

            // Optimistic write of the mutated ledger; on conflict,
            // re-read and replay the whole validate/resolve cycle.
            match (&record, character_id) {
                (Some(current), Some(character_id)) => {
                    let ledger = staged
                        .ledger(caster_id)
                        .cloned()
                        .ok_or(EngineError::CombatantNotFound(caster_id))?;
                    let write = self
                        .directory
                        .update_combatant(
                            character_id,
                            CombatantPatch::ledger(ledger),
                            current.version,
                        )
                        .await
                        .map_err(|e| EngineError::DirectoryUnavailable(e.to_string()))?;
                    match write {
                        DirectoryWriteOutcome::Ok { .. } => {
                            break (staged, outcome, validation.warnings)
                        }
                        DirectoryWriteOutcome::Conflict { .. } => {
                            attempts += 1;
                            if attempts >= self.retry_limit {
                                return Err(EngineError::Conflict { attempts });
                            }
                            record = Some(self.fetch_record(character_id).await?);
                        }
                    }
                }
                _ => break (staged, outcome, validation.warnings),
            }
        };

        let event = self
            .commit(
                staged,
                DeltaKind::SpellCast {
                    caster: caster_id,
                    spell_id,
                    spell_name: outcome.spell_name.clone(),
                    cast_level,
                    extra_units: outcome.extra_units,
                    scaling_unit: outcome.scaling_unit.clone(),
                    effect_id: outcome.effect_id,
                },
                warnings,
            )
            .await?;
        Ok((event, outcome))
    }

    pub async fn apply_damage(
        &self,
        encounter_id: EncounterId,
        target_id: CombatantId,
        amount: i32,
        damage_type: &str,
    ) -> Result<DeltaEvent, EngineError> {
        self.apply_hp_change(encounter_id, target_id, amount, Some(damage_type))
            .await
    }

    pub async fn apply_healing(
        &self,
        encounter_id: EncounterId,
        target_id: CombatantId,
        amount: i32,
    ) -> Result<DeltaEvent, EngineError> {
        self.apply_hp_change(encounter_id, target_id, amount, None)
            .await
    }

    /// Shared damage/healing path with the optimistic directory cycle.
    async fn apply_hp_change(
        &self,
        encounter_id: EncounterId,
        target_id: CombatantId,
        amount: i32,
        damage_type: Option<&str>,
    ) -> Result<DeltaEvent, EngineError> {
        let character_id = {
            let states = self.states.read().await;
            let state = states
                .get(&encounter_id)
                .ok_or(EngineError::EncounterNotFound(encounter_id))?;
            state
                .combatant(target_id)
                .ok_or(EngineError::CombatantNotFound(target_id))?
                .character_id()
        };
        let mut record = match character_id {
            Some(character_id) => Some(self.fetch_record(character_id).await?),
            None => None,
        };

        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        if staged.status() == EncounterStatus::Ended {
            return Err(EngineError::Blocked(vec![Blocker::EncounterNotActive {
                status: staged.status(),
            }]));
        }

        let new_hp = match (&mut record, character_id) {
            (Some(current), Some(character_id)) => {
                // Read-validate-write against the directory's value so
                // racing intents each land exactly once.
                let mut attempts = 0u32;
                loop {
                    let new_hp = match damage_type {
                        Some(_) => current.hit_points.apply_damage(amount),
                        None => current.hit_points.apply_healing(amount),
                    };
                    let write = self
                        .directory
                        .update_combatant(
                            character_id,
                            CombatantPatch::hit_points(new_hp),
                            current.version,
                        )
                        .await
                        .map_err(|e| EngineError::DirectoryUnavailable(e.to_string()))?;
                    match write {
                        DirectoryWriteOutcome::Ok { .. } => break new_hp,
                        DirectoryWriteOutcome::Conflict { .. } => {
                            attempts += 1;
                            if attempts >= self.retry_limit {
                                return Err(EngineError::Conflict { attempts });
                            }
                            *current = self.fetch_record(character_id).await?;
                        }
                    }
                }
            }
            _ => {
                let combatant = staged
                    .combatant(target_id)
                    .ok_or(EngineError::CombatantNotFound(target_id))?;
                match damage_type {
                    Some(_) => combatant.hit_points.apply_damage(amount),
                    None => combatant.hit_points.apply_healing(amount),
                }
            }
        };

        if let Some(combatant) = staged.combatant_mut(target_id) {
            combatant.hit_points = new_hp;
        }

        let kind = match damage_type {
            Some(damage_type) => DeltaKind::DamageApplied {
                target: target_id,
                amount,
                damage_type: damage_type.to_string(),
                remaining_hp: new_hp.current,
            },
            None => DeltaKind::HealingApplied {
                target: target_id,
                amount,
                remaining_hp: new_hp.current,
            },
        };
        self.commit(staged, kind, Vec::new()).await
    }

    /// Apply a short or long rest to one combatant's resource pools.
    pub async fn take_rest(
        &self,
        encounter_id: EncounterId,
        combatant_id: CombatantId,
        rest: RestKind,
    ) -> Result<DeltaEvent, EngineError> {
        let character_id = {
            let states = self.states.read().await;
            let state = states
                .get(&encounter_id)
                .ok_or(EngineError::EncounterNotFound(encounter_id))?;
            state
                .combatant(combatant_id)
                .ok_or(EngineError::CombatantNotFound(combatant_id))?
                .character_id()
        };
        let mut record = match character_id {
            Some(character_id) => Some(self.fetch_record(character_id).await?),
            None => None,
        };

        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;

        let rested = match (&mut record, character_id) {
            (Some(current), Some(character_id)) => {
                let mut attempts = 0u32;
                loop {
                    let mut ledger = current.ledger.clone();
                    ledger.rest(rest);
                    let write = self
                        .directory
                        .update_combatant(
                            character_id,
                            CombatantPatch::ledger(ledger.clone()),
                            current.version,
                        )
                        .await
                        .map_err(|e| EngineError::DirectoryUnavailable(e.to_string()))?;
                    match write {
                        DirectoryWriteOutcome::Ok { .. } => break ledger,
                        DirectoryWriteOutcome::Conflict { .. } => {
                            attempts += 1;
                            if attempts >= self.retry_limit {
                                return Err(EngineError::Conflict { attempts });
                            }
                            *current = self.fetch_record(character_id).await?;
                        }
                    }
                }
            }
            _ => {
                let mut ledger = staged
                    .ledger(combatant_id)
                    .cloned()
                    .ok_or(EngineError::CombatantNotFound(combatant_id))?;
                ledger.rest(rest);
                ledger
            }
        };

        if let Some(ledger) = staged.ledger_mut(combatant_id) {
            *ledger = rested;
        }
        self.commit(
            staged,
            DeltaKind::RestTaken { combatant_id, rest },
            Vec::new(),
        )
        .await
    }

    /// Attach a transient modifier tag to a combatant.
    pub async fn add_modifier(
        &self,
        encounter_id: EncounterId,
        combatant_id: CombatantId,
        modifier: CombatModifier,
    ) -> Result<DeltaEvent, EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        staged
            .combatant_mut(combatant_id)
            .ok_or(EngineError::CombatantNotFound(combatant_id))?
            .add_modifier(modifier.clone());
        self.commit(
            staged,
            DeltaKind::ModifierAdded {
                combatant_id,
                modifier,
            },
            Vec::new(),
        )
        .await
    }

    /// Issue a group saving-throw prompt.
    pub async fn prompt_save(
        &self,
        encounter_id: EncounterId,
        ability: Ability,
        dc: i32,
        scope: TargetScope,
        advantage: AdvantageMode,
    ) -> Result<DeltaEvent, EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        let prompt = staged.create_save_prompt(ability, dc, scope, advantage);
        self.commit(
            staged,
            DeltaKind::SavePromptIssued {
                prompt_id: prompt.id,
                ability: prompt.ability,
                dc: prompt.dc,
                advantage: prompt.advantage,
                expected_responses: prompt.expected_responses,
            },
            Vec::new(),
        )
        .await
    }

    /// Record one combatant's save response.
    pub async fn record_save_response(
        &self,
        encounter_id: EncounterId,
        prompt_id: PromptId,
        combatant_id: CombatantId,
        success: bool,
    ) -> Result<DeltaEvent, EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let mut staged = self.staged(encounter_id).await?;
        let (received, expected) = staged
            .record_save_response(prompt_id)
            .ok_or(EngineError::PromptNotFound(prompt_id))?;
        self.commit(
            staged,
            DeltaKind::SaveResponseRecorded {
                prompt_id,
                combatant_id,
                success,
                received_responses: received,
                expected_responses: expected,
            },
            Vec::new(),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Full-state snapshot plus the sequence number it reflects, for
    /// join and gap-triggered resync. Serialized with writers so the
    /// pair is consistent.
    pub async fn get_snapshot(
        &self,
        encounter_id: EncounterId,
    ) -> Result<(EncounterState, u64), EngineError> {
        let _slot = self.guard.acquire(encounter_id).await?;
        let states = self.states.read().await;
        let state = states
            .get(&encounter_id)
            .ok_or(EngineError::EncounterNotFound(encounter_id))?;
        let sequence = self
            .hub
            .current_sequence(encounter_id)
            .await
            .unwrap_or_default();
        Ok((state.clone(), sequence))
    }

    /// Drop ended encounters nobody is subscribed to. Run periodically
    /// by the maintenance worker.
    pub async fn sweep_ended(&self) -> usize {
        let ended: Vec<EncounterId> = {
            let states = self.states.read().await;
            states
                .iter()
                .filter(|(_, s)| s.status() == EncounterStatus::Ended)
                .map(|(id, _)| *id)
                .collect()
        };
        let mut swept = 0;
        for encounter_id in ended {
            if self.hub.subscriber_count(encounter_id).await == 0 {
                self.states.write().await.remove(&encounter_id);
                self.hub.close_channel(encounter_id).await;
                self.guard.remove(encounter_id).await;
                swept += 1;
                tracing::info!("Swept ended encounter {}", encounter_id);
            }
        }
        swept
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn fetch_record(
        &self,
        character_id: CharacterId,
    ) -> Result<CombatantRecord, EngineError> {
        self.directory
            .get_combatant(character_id)
            .await
            .map_err(|e| EngineError::DirectoryUnavailable(e.to_string()))
    }

    /// Clone the current aggregate as the staging copy for one intent.
    async fn staged(&self, encounter_id: EncounterId) -> Result<EncounterState, EngineError> {
        let states = self.states.read().await;
        states
            .get(&encounter_id)
            .cloned()
            .ok_or(EngineError::EncounterNotFound(encounter_id))
    }

    /// Persist the delta, commit the staged state, and fan out. On a
    /// failed persist the sequence is released and the staged state
    /// discarded: no broadcast, no state change.
    async fn commit(
        &self,
        staged: EncounterState,
        kind: DeltaKind,
        warnings: Vec<Warning>,
    ) -> Result<DeltaEvent, EngineError> {
        let encounter_id = staged.id();
        let sequence = self
            .hub
            .reserve_sequence(encounter_id)
            .await
            .map_err(|_| EngineError::EncounterNotFound(encounter_id))?;
        let event = DeltaEvent::new(encounter_id, sequence, kind).with_warnings(warnings);

        if let Err(e) = self.store.append_event(&event).await {
            self.hub.release_sequence(encounter_id, sequence).await;
            tracing::error!("Failed to persist delta for {}: {}", encounter_id, e);
            return Err(EngineError::Persistence(e.to_string()));
        }
        // The event log is the commit point; a stale snapshot is
        // recoverable from it, so snapshot failures only warn.
        if let Err(e) = self
            .store
            .save_snapshot(encounter_id, &staged, sequence)
            .await
        {
            tracing::warn!("Failed to save snapshot for {}: {}", encounter_id, e);
        }

        self.states.write().await.insert(encounter_id, staged);
        self.hub.dispatch(&event).await;
        Ok(event)
    }
}
