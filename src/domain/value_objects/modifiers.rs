//! Transient combat modifiers - advantage, disadvantage, and cover tags

use serde::{Deserialize, Serialize};

/// How many d20s an attack draws and which is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvantageMode {
    Normal,
    Advantage,
    Disadvantage,
}

impl Default for AdvantageMode {
    fn default() -> Self {
        Self::Normal
    }
}

impl AdvantageMode {
    /// Combine two modes: advantage and disadvantage cancel to normal,
    /// matching modes keep their direction.
    pub fn combine(self, other: AdvantageMode) -> AdvantageMode {
        use AdvantageMode::*;
        match (self, other) {
            (Normal, m) | (m, Normal) => m,
            (Advantage, Advantage) => Advantage,
            (Disadvantage, Disadvantage) => Disadvantage,
            _ => Normal,
        }
    }
}

/// Cover tier between attacker and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverTier {
    None,
    Half,
    ThreeQuarters,
    /// Full cover forbids targeting entirely; it is a precondition error,
    /// not a miss.
    Full,
}

impl Default for CoverTier {
    fn default() -> Self {
        Self::None
    }
}

impl CoverTier {
    /// Effective AC bonus granted by this tier.
    pub fn ac_bonus(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Half => 2,
            Self::ThreeQuarters => 5,
            Self::Full => 0,
        }
    }

    pub fn allows_targeting(&self) -> bool {
        !matches!(self, Self::Full)
    }
}

/// Kind of transient tag attached to a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Advantage,
    Disadvantage,
    CoverHalf,
    CoverThreeQuarters,
    CoverFull,
}

/// A transient tag on a combatant with a source and optional expiry round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatModifier {
    pub kind: ModifierKind,
    /// Where the tag came from (spell name, DM ruling, terrain feature).
    pub source: String,
    /// Round after which the tag is dropped; `None` lasts until removed.
    pub expires_after_round: Option<u32>,
}

impl CombatModifier {
    pub fn new(kind: ModifierKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            expires_after_round: None,
        }
    }

    pub fn until_round(mut self, round: u32) -> Self {
        self.expires_after_round = Some(round);
        self
    }

    pub fn is_expired(&self, current_round: u32) -> bool {
        self.expires_after_round
            .map(|r| current_round > r)
            .unwrap_or(false)
    }
}

/// Resolve the net advantage mode from a set of tags.
///
/// Any advantage tag together with any disadvantage tag cancels to
/// `Normal`, regardless of how many of each are present.
pub fn resolve_advantage(modifiers: &[CombatModifier]) -> AdvantageMode {
    let has_advantage = modifiers
        .iter()
        .any(|m| m.kind == ModifierKind::Advantage);
    let has_disadvantage = modifiers
        .iter()
        .any(|m| m.kind == ModifierKind::Disadvantage);

    match (has_advantage, has_disadvantage) {
        (true, true) | (false, false) => AdvantageMode::Normal,
        (true, false) => AdvantageMode::Advantage,
        (false, true) => AdvantageMode::Disadvantage,
    }
}

/// Strongest cover tier among a set of tags.
pub fn resolve_cover(modifiers: &[CombatModifier]) -> CoverTier {
    let mut cover = CoverTier::None;
    for modifier in modifiers {
        let tier = match modifier.kind {
            ModifierKind::CoverFull => CoverTier::Full,
            ModifierKind::CoverThreeQuarters => CoverTier::ThreeQuarters,
            ModifierKind::CoverHalf => CoverTier::Half,
            _ => continue,
        };
        cover = match (cover, tier) {
            (CoverTier::Full, _) | (_, CoverTier::Full) => CoverTier::Full,
            (CoverTier::ThreeQuarters, _) | (_, CoverTier::ThreeQuarters) => {
                CoverTier::ThreeQuarters
            }
            _ => CoverTier::Half,
        };
    }
    cover
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advantage_and_disadvantage_cancel() {
        let mods = vec![
            CombatModifier::new(ModifierKind::Advantage, "Flanking"),
            CombatModifier::new(ModifierKind::Advantage, "Faerie Fire"),
            CombatModifier::new(ModifierKind::Disadvantage, "Poisoned"),
        ];
        assert_eq!(resolve_advantage(&mods), AdvantageMode::Normal);
    }

    #[test]
    fn test_lone_advantage_survives() {
        let mods = vec![CombatModifier::new(ModifierKind::Advantage, "Hidden")];
        assert_eq!(resolve_advantage(&mods), AdvantageMode::Advantage);

        let mods = vec![CombatModifier::new(ModifierKind::Disadvantage, "Prone")];
        assert_eq!(resolve_advantage(&mods), AdvantageMode::Disadvantage);
    }

    #[test]
    fn test_no_tags_is_normal() {
        assert_eq!(resolve_advantage(&[]), AdvantageMode::Normal);
    }

    #[test]
    fn test_combine_modes() {
        use AdvantageMode::*;
        assert_eq!(Advantage.combine(Disadvantage), Normal);
        assert_eq!(Advantage.combine(Normal), Advantage);
        assert_eq!(Disadvantage.combine(Disadvantage), Disadvantage);
    }

    #[test]
    fn test_cover_bonus_values() {
        assert_eq!(CoverTier::None.ac_bonus(), 0);
        assert_eq!(CoverTier::Half.ac_bonus(), 2);
        assert_eq!(CoverTier::ThreeQuarters.ac_bonus(), 5);
        assert!(!CoverTier::Full.allows_targeting());
    }

    #[test]
    fn test_strongest_cover_wins() {
        let mods = vec![
            CombatModifier::new(ModifierKind::CoverHalf, "Low wall"),
            CombatModifier::new(ModifierKind::CoverThreeQuarters, "Arrow slit"),
        ];
        assert_eq!(resolve_cover(&mods), CoverTier::ThreeQuarters);
    }

    #[test]
    fn test_modifier_expiry() {
        let modifier =
            CombatModifier::new(ModifierKind::Advantage, "Blessed").until_round(2);
        assert!(!modifier.is_expired(2));
        assert!(modifier.is_expired(3));
    }
}
