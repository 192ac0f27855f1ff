//! Encounter entity - lifecycle state machine and turn order

use serde::{Deserialize, Serialize};

use crate::domain::entities::initiative::{sort_initiative, InitiativeEntry};
use crate::domain::value_objects::{CombatantId, EncounterId};

/// Encounter lifecycle. `Ended` is terminal; `Paused` is re-enterable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterStatus {
    Preparing,
    Active,
    Paused,
    Ended,
}

impl EncounterStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Preparing => "Preparing",
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Ended => "Ended",
        }
    }
}

/// Attempted lifecycle or turn operation in the wrong state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {intent} while encounter is {state:?}")]
pub struct InvalidTransition {
    pub state: EncounterStatus,
    pub intent: &'static str,
}

/// What `advance_turn` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnAdvance {
    /// Combatant whose turn ended.
    pub previous: CombatantId,
    /// Combatant whose turn is now current.
    pub next: CombatantId,
    /// True when the order wrapped and a new round began.
    pub new_round: bool,
    pub round: u32,
}

/// One bounded combat session with its own turn/round state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub name: String,
    pub status: EncounterStatus,
    /// Current round, starting at 1 when the encounter starts.
    pub round: u32,
    /// Turn order; sorted when the encounter starts.
    pub order: Vec<InitiativeEntry>,
}

impl Encounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EncounterId::new(),
            name: name.into(),
            status: EncounterStatus::Preparing,
            round: 1,
            order: Vec::new(),
        }
    }

    fn guard(&self, expected: EncounterStatus, intent: &'static str) -> Result<(), InvalidTransition> {
        if self.status == expected {
            Ok(())
        } else {
            Err(InvalidTransition {
                state: self.status,
                intent,
            })
        }
    }

    /// Add a combatant to the turn order. Only valid while preparing.
    pub fn add_entry(
        &mut self,
        combatant_id: CombatantId,
        roll: i32,
        dexterity_modifier: i32,
        passive_perception: i32,
    ) -> Result<(), InvalidTransition> {
        self.guard(EncounterStatus::Preparing, "add a combatant")?;
        let entry = InitiativeEntry::new(
            combatant_id,
            roll,
            dexterity_modifier,
            passive_perception,
            self.order.len(),
        );
        self.order.push(entry);
        Ok(())
    }

    /// Sort the order and begin round 1 with the top entry current.
    /// Only valid from `Preparing`.
    pub fn start(&mut self) -> Result<CombatantId, InvalidTransition> {
        self.guard(EncounterStatus::Preparing, "start the encounter")?;
        if self.order.is_empty() {
            return Err(InvalidTransition {
                state: self.status,
                intent: "start an encounter with no combatants",
            });
        }
        sort_initiative(&mut self.order);
        self.round = 1;
        self.order[0].is_current_turn = true;
        self.status = EncounterStatus::Active;
        Ok(self.order[0].combatant_id)
    }

    pub fn pause(&mut self) -> Result<(), InvalidTransition> {
        self.guard(EncounterStatus::Active, "pause the encounter")?;
        self.status = EncounterStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), InvalidTransition> {
        self.guard(EncounterStatus::Paused, "resume the encounter")?;
        self.status = EncounterStatus::Active;
        Ok(())
    }

    /// End the encounter. Valid from any non-terminal state.
    pub fn end(&mut self) -> Result<(), InvalidTransition> {
        if self.status == EncounterStatus::Ended {
            return Err(InvalidTransition {
                state: self.status,
                intent: "end the encounter",
            });
        }
        self.status = EncounterStatus::Ended;
        for entry in &mut self.order {
            entry.is_current_turn = false;
        }
        Ok(())
    }

    /// Move the current-turn flag to the next entry in sort order,
    /// incrementing the round on wrap.
    pub fn advance_turn(&mut self) -> Result<TurnAdvance, InvalidTransition> {
        self.guard(EncounterStatus::Active, "advance the turn")?;
        let current_index = self
            .order
            .iter()
            .position(|e| e.is_current_turn)
            .ok_or(InvalidTransition {
                state: self.status,
                intent: "advance a turn with no current entry",
            })?;

        let previous = self.order[current_index].combatant_id;
        self.order[current_index].is_current_turn = false;

        let next_index = (current_index + 1) % self.order.len();
        let new_round = next_index == 0;
        if new_round {
            self.round += 1;
        }
        self.order[next_index].is_current_turn = true;

        Ok(TurnAdvance {
            previous,
            next: self.order[next_index].combatant_id,
            new_round,
            round: self.round,
        })
    }

    /// The combatant whose turn it currently is, if the encounter is live.
    pub fn current_combatant(&self) -> Option<CombatantId> {
        self.order
            .iter()
            .find(|e| e.is_current_turn)
            .map(|e| e.combatant_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == EncounterStatus::Active
    }
}
