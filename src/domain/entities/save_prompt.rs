//! Saving-throw prompts - counters for group save requests

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{AdvantageMode, CombatantId, PromptId};

/// The six abilities a save can key off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Strength => "Strength",
            Self::Dexterity => "Dexterity",
            Self::Constitution => "Constitution",
            Self::Intelligence => "Intelligence",
            Self::Wisdom => "Wisdom",
            Self::Charisma => "Charisma",
        }
    }
}

/// Who a save prompt addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum TargetScope {
    /// Every combatant in the encounter.
    All,
    /// A named set of combatants.
    Combatants { ids: Vec<CombatantId> },
}

impl TargetScope {
    pub fn expected_count(&self, roster_size: usize) -> u32 {
        match self {
            Self::All => roster_size as u32,
            Self::Combatants { ids } => ids.len() as u32,
        }
    }
}

/// A pending saving-throw request with response counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePrompt {
    pub id: PromptId,
    pub ability: Ability,
    pub dc: i32,
    pub scope: TargetScope,
    pub advantage: AdvantageMode,
    pub expected_responses: u32,
    pub received_responses: u32,
}

impl SavePrompt {
    pub fn new(ability: Ability, dc: i32, scope: TargetScope, roster_size: usize) -> Self {
        let expected_responses = scope.expected_count(roster_size);
        Self {
            id: PromptId::new(),
            ability,
            dc,
            scope,
            advantage: AdvantageMode::Normal,
            expected_responses,
            received_responses: 0,
        }
    }

    pub fn with_advantage(mut self, mode: AdvantageMode) -> Self {
        self.advantage = mode;
        self
    }

    /// Record one response. Returns true while more are still expected.
    pub fn record_response(&mut self) -> bool {
        if self.received_responses < self.expected_responses {
            self.received_responses += 1;
        }
        !self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.received_responses >= self.expected_responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_toward_completion() {
        let mut prompt = SavePrompt::new(Ability::Dexterity, 14, TargetScope::All, 3);
        assert_eq!(prompt.expected_responses, 3);
        assert!(prompt.record_response());
        assert!(prompt.record_response());
        assert!(!prompt.record_response());
        assert!(prompt.is_complete());
    }

    #[test]
    fn test_extra_responses_do_not_overflow() {
        let mut prompt = SavePrompt::new(
            Ability::Wisdom,
            12,
            TargetScope::Combatants {
                ids: vec![CombatantId::new()],
            },
            5,
        );
        prompt.record_response();
        prompt.record_response();
        assert_eq!(prompt.received_responses, 1);
    }
}
