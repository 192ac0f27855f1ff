//! Per-turn action economy - the action/bonus action/reaction budget

use serde::{Deserialize, Serialize};

/// The economy slot an intent spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomySlot {
    Action,
    BonusAction,
    Reaction,
}

impl EconomySlot {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Action => "Action",
            Self::BonusAction => "Bonus Action",
            Self::Reaction => "Reaction",
        }
    }
}

/// Per-combatant, per-round budget of actions. Reset when the combatant's
/// turn begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub action_used: bool,
    pub bonus_action_used: bool,
    pub reaction_used: bool,
    /// A turn may contain at most one leveled (non-cantrip) spell.
    pub has_leveled_spell_this_turn: bool,
    pub leveled_spell_was_bonus_action: bool,
}

impl ActionEconomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_used(&self, slot: EconomySlot) -> bool {
        match slot {
            EconomySlot::Action => self.action_used,
            EconomySlot::BonusAction => self.bonus_action_used,
            EconomySlot::Reaction => self.reaction_used,
        }
    }

    pub fn mark_used(&mut self, slot: EconomySlot) {
        match slot {
            EconomySlot::Action => self.action_used = true,
            EconomySlot::BonusAction => self.bonus_action_used = true,
            EconomySlot::Reaction => self.reaction_used = true,
        }
    }

    /// Record that a leveled spell was cast through the given slot.
    pub fn note_leveled_cast(&mut self, slot: EconomySlot) {
        self.has_leveled_spell_this_turn = true;
        self.leveled_spell_was_bonus_action = slot == EconomySlot::BonusAction;
    }
}
