//! Attack roll resolution
//!
//! Pure to-hit arithmetic: draws through a `DiceRoller`, applies advantage
//! selection and cover, and reports the outcome. Damage application is a
//! separate caller-driven step so damage rolls can be composed afterward.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::dice::DiceRoller;
use crate::domain::value_objects::modifiers::{AdvantageMode, CoverTier};

/// Result of a resolved attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    /// The kept d20 result.
    pub d20: u8,
    /// Kept d20 plus the attacker's flat attack bonus.
    pub total: i32,
    pub is_hit: bool,
    /// Set only on a natural 20 that also hits.
    pub is_critical: bool,
}

/// Targeting a combatant behind full cover is rejected before any die is
/// drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("target has full cover and cannot be attacked")]
pub struct FullCoverError;

/// Resolve a to-hit roll.
///
/// One d20 under `Normal`, two under `Advantage`/`Disadvantage` keeping the
/// max/min respectively. Natural 20 always hits, natural 1 always misses;
/// otherwise hit iff `roll + bonus >= AC + cover bonus`.
pub fn resolve_attack(
    attack_bonus: i32,
    target_ac: i32,
    mode: AdvantageMode,
    cover: CoverTier,
    roller: &mut dyn DiceRoller,
) -> Result<AttackOutcome, FullCoverError> {
    if !cover.allows_targeting() {
        return Err(FullCoverError);
    }

    let d20 = match mode {
        AdvantageMode::Normal => roller.d20(),
        AdvantageMode::Advantage => roller.d20().max(roller.d20()),
        AdvantageMode::Disadvantage => roller.d20().min(roller.d20()),
    };

    let total = i32::from(d20) + attack_bonus;
    let effective_ac = target_ac + cover.ac_bonus();

    let is_hit = match d20 {
        20 => true,
        1 => false,
        _ => total >= effective_ac,
    };

    Ok(AttackOutcome {
        d20,
        total,
        is_hit,
        is_critical: d20 == 20 && is_hit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::dice::SequenceRoller;

    #[test]
    fn test_natural_twenty_always_hits() {
        let mut roller = SequenceRoller::new([20]);
        let outcome =
            resolve_attack(-5, 30, AdvantageMode::Normal, CoverTier::None, &mut roller)
                .unwrap();
        assert!(outcome.is_hit);
        assert!(outcome.is_critical);
    }

    #[test]
    fn test_natural_one_always_misses() {
        let mut roller = SequenceRoller::new([1]);
        let outcome =
            resolve_attack(30, 5, AdvantageMode::Normal, CoverTier::None, &mut roller)
                .unwrap();
        assert!(!outcome.is_hit);
        assert!(!outcome.is_critical);
    }

    #[test]
    fn test_full_cover_rejected_before_rolling() {
        let mut roller = SequenceRoller::new(Vec::new());
        let result =
            resolve_attack(5, 15, AdvantageMode::Normal, CoverTier::Full, &mut roller);
        assert_eq!(result, Err(FullCoverError));
    }

    #[test]
    fn test_plus_five_versus_ac_fifteen_on_a_twelve() {
        let mut roller = SequenceRoller::new([12]);
        let outcome =
            resolve_attack(5, 15, AdvantageMode::Normal, CoverTier::None, &mut roller)
                .unwrap();
        assert_eq!(outcome.total, 17);
        assert!(outcome.is_hit);
        assert!(!outcome.is_critical);
    }

    #[test]
    fn test_advantage_keeps_higher_die() {
        let mut roller = SequenceRoller::new([4, 17]);
        let outcome =
            resolve_attack(0, 15, AdvantageMode::Advantage, CoverTier::None, &mut roller)
                .unwrap();
        assert_eq!(outcome.d20, 17);
        assert!(outcome.is_hit);
    }

    #[test]
    fn test_disadvantage_keeps_lower_die() {
        let mut roller = SequenceRoller::new([4, 17]);
        let outcome = resolve_attack(
            0,
            15,
            AdvantageMode::Disadvantage,
            CoverTier::None,
            &mut roller,
        )
        .unwrap();
        assert_eq!(outcome.d20, 4);
        assert!(!outcome.is_hit);
    }

    #[test]
    fn test_half_cover_shifts_the_target() {
        // 13 + 2 = 15 meets AC 15 without cover, but not AC 15 + 2.
        let mut roller = SequenceRoller::new([13]);
        let outcome =
            resolve_attack(2, 15, AdvantageMode::Normal, CoverTier::Half, &mut roller)
                .unwrap();
        assert!(!outcome.is_hit);

        let mut roller = SequenceRoller::new([13]);
        let outcome =
            resolve_attack(2, 15, AdvantageMode::Normal, CoverTier::None, &mut roller)
                .unwrap();
        assert!(outcome.is_hit);
    }

    #[test]
    fn test_three_quarters_cover_bonus() {
        // 18 + 2 = 20 meets AC 15 + 5 exactly.
        let mut roller = SequenceRoller::new([18]);
        let outcome = resolve_attack(
            2,
            15,
            AdvantageMode::Normal,
            CoverTier::ThreeQuarters,
            &mut roller,
        )
        .unwrap();
        assert!(outcome.is_hit);
    }

    #[test]
    fn test_critical_requires_hit() {
        // Natural 20 against full cover never happens (rejected), and a
        // natural 20 otherwise always hits, so every natural 20 outcome is
        // critical.
        let mut roller = SequenceRoller::new([20]);
        let outcome =
            resolve_attack(0, 28, AdvantageMode::Normal, CoverTier::Half, &mut roller)
                .unwrap();
        assert!(outcome.is_hit);
        assert!(outcome.is_critical);
    }
}
