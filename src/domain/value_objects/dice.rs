//! Dice rolling abstraction
//!
//! Rules code never touches an RNG directly; it draws through the
//! `DiceRoller` trait so that resolution is reproducible in tests and
//! replayable from a seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of d20 draws for attack and save resolution.
pub trait DiceRoller: Send {
    /// Draw a single d20 in `1..=20`.
    fn d20(&mut self) -> u8;
}

/// Production roller backed by a seeded `StdRng`.
pub struct RandomRoller {
    rng: StdRng,
}

impl RandomRoller {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded construction for replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomRoller {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceRoller for RandomRoller {
    fn d20(&mut self) -> u8 {
        self.rng.gen_range(1..=20)
    }
}

/// Scripted roller that replays a fixed sequence of d20 results.
///
/// Used by tests and by replay tooling; panics if the script runs dry,
/// which in a test is exactly the failure we want to see.
pub struct SequenceRoller {
    rolls: Vec<u8>,
    next: usize,
}

impl SequenceRoller {
    pub fn new(rolls: impl Into<Vec<u8>>) -> Self {
        Self {
            rolls: rolls.into(),
            next: 0,
        }
    }
}

impl DiceRoller for SequenceRoller {
    fn d20(&mut self) -> u8 {
        let roll = self.rolls[self.next];
        self.next += 1;
        roll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_roller_in_range() {
        let mut roller = RandomRoller::seeded(42);
        for _ in 0..200 {
            let roll = roller.d20();
            assert!((1..=20).contains(&roll));
        }
    }

    #[test]
    fn test_seeded_roller_is_deterministic() {
        let mut a = RandomRoller::seeded(7);
        let mut b = RandomRoller::seeded(7);
        let rolls_a: Vec<u8> = (0..10).map(|_| a.d20()).collect();
        let rolls_b: Vec<u8> = (0..10).map(|_| b.d20()).collect();
        assert_eq!(rolls_a, rolls_b);
    }

    #[test]
    fn test_sequence_roller_replays_script() {
        let mut roller = SequenceRoller::new([20, 1, 12]);
        assert_eq!(roller.d20(), 20);
        assert_eq!(roller.d20(), 1);
        assert_eq!(roller.d20(), 12);
    }
}
