//! Initiative entries and turn ordering

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::CombatantId;

/// One combatant's place in the turn order.
///
/// Exactly one entry per encounter may have `is_current_turn` set; the
/// encounter enforces that invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub combatant_id: CombatantId,
    pub roll: i32,
    pub dexterity_modifier: i32,
    pub passive_perception: i32,
    /// Insertion index; final tie-break so ordering is stable and
    /// deterministic.
    pub inserted_at: usize,
    pub is_current_turn: bool,
}

impl InitiativeEntry {
    pub fn new(
        combatant_id: CombatantId,
        roll: i32,
        dexterity_modifier: i32,
        passive_perception: i32,
        inserted_at: usize,
    ) -> Self {
        Self {
            combatant_id,
            roll,
            dexterity_modifier,
            passive_perception,
            inserted_at,
            is_current_turn: false,
        }
    }

    /// Turn-order comparison: roll descending, then dexterity modifier
    /// descending, then passive perception descending, then insertion
    /// order.
    pub fn compare(&self, other: &Self) -> Ordering {
        other
            .roll
            .cmp(&self.roll)
            .then(other.dexterity_modifier.cmp(&self.dexterity_modifier))
            .then(other.passive_perception.cmp(&self.passive_perception))
            .then(self.inserted_at.cmp(&other.inserted_at))
    }
}

/// Sort entries into turn order.
pub fn sort_initiative(entries: &mut [InitiativeEntry]) {
    entries.sort_by(InitiativeEntry::compare);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(roll: i32, dex: i32, passive: i32, inserted_at: usize) -> InitiativeEntry {
        InitiativeEntry::new(CombatantId::new(), roll, dex, passive, inserted_at)
    }

    #[test]
    fn test_descending_by_roll() {
        let mut entries = vec![entry(12, 0, 10, 0), entry(20, 0, 10, 1), entry(15, 0, 10, 2)];
        sort_initiative(&mut entries);
        let rolls: Vec<i32> = entries.iter().map(|e| e.roll).collect();
        assert_eq!(rolls, vec![20, 15, 12]);
    }

    #[test]
    fn test_tie_broken_by_dexterity() {
        // A (init 18, dex +3) before B (init 18, dex +1).
        let a = entry(18, 3, 10, 0);
        let b = entry(18, 1, 10, 1);
        let a_id = a.combatant_id;
        let mut entries = vec![b, a];
        sort_initiative(&mut entries);
        assert_eq!(entries[0].combatant_id, a_id);
    }

    #[test]
    fn test_tie_broken_by_passive_perception_then_insertion() {
        let first = entry(10, 2, 14, 0);
        let second = entry(10, 2, 12, 1);
        let third = entry(10, 2, 12, 2);
        let ids = [
            first.combatant_id,
            second.combatant_id,
            third.combatant_id,
        ];
        let mut entries = vec![third, first, second];
        sort_initiative(&mut entries);
        let sorted: Vec<CombatantId> = entries.iter().map(|e| e.combatant_id).collect();
        assert_eq!(sorted, ids);
    }

    #[test]
    fn test_sort_is_deterministic() {
        let entries: Vec<InitiativeEntry> =
            (0..6).map(|i| entry(10, 0, 10, i)).collect();
        let mut a = entries.clone();
        let mut b = entries;
        b.reverse();
        sort_initiative(&mut a);
        sort_initiative(&mut b);
        let ids_a: Vec<CombatantId> = a.iter().map(|e| e.combatant_id).collect();
        let ids_b: Vec<CombatantId> = b.iter().map(|e| e.combatant_id).collect();
        assert_eq!(ids_a, ids_b);
    }
}
