//! Resource ledger - consumable combatant resources with conservation
//! invariants
//!
//! Pools are keyed by enumerated resource kinds rather than an open-ended
//! map, so every consumption site is typed and every pool carries its own
//! bounds. The invariant `0 <= used <= max + bonus` holds across any
//! sequence of consume/restore calls; a delta that would leave the range is
//! a no-op that signals a typed error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// When a pool's `used` counter resets to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestKind {
    Short,
    Long,
}

/// Enumerated resource kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    /// Spell slot of a given level (1..=9).
    SpellSlot { level: u8 },
    /// Gold pieces, consumed by costed material components.
    Currency,
    /// Named class resource (ki, rage, sorcery points, ...).
    Class { name: String },
}

impl ResourceKind {
    pub fn slot(level: u8) -> Self {
        Self::SpellSlot { level }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::Class { name: name.into() }
    }
}

/// A single bounded pool: `used` out of `max + bonus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub max: u32,
    pub used: u32,
    /// Temporary extra capacity (e.g. a bonus slot from an item).
    pub bonus: u32,
    /// Rest tier that resets this pool; `None` never auto-resets.
    pub reset_on: Option<RestKind>,
}

impl ResourcePool {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            used: 0,
            bonus: 0,
            reset_on: None,
        }
    }

    pub fn with_bonus(mut self, bonus: u32) -> Self {
        self.bonus = bonus;
        self
    }

    pub fn resetting_on(mut self, rest: RestKind) -> Self {
        self.reset_on = Some(rest);
        self
    }

    pub fn capacity(&self) -> u32 {
        self.max + self.bonus
    }

    pub fn available(&self) -> u32 {
        self.capacity().saturating_sub(self.used)
    }
}

/// Errors signalled by ledger operations. The pool is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceError {
    #[error("insufficient resource: the delta exceeds what remains")]
    InsufficientResource,
    #[error("resource already at capacity")]
    AtCapacity,
    #[error("unknown resource")]
    UnknownResource,
}

/// Typed ledger of consumable pools for one combatant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLedger {
    pools: HashMap<ResourceKind, ResourcePool>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, kind: ResourceKind, pool: ResourcePool) -> Self {
        self.pools.insert(kind, pool);
        self
    }

    /// Spell-slot ledgers reset on a long rest by convention.
    pub fn with_slots(mut self, level: u8, max: u32) -> Self {
        self.pools.insert(
            ResourceKind::slot(level),
            ResourcePool::new(max).resetting_on(RestKind::Long),
        );
        self
    }

    pub fn pool(&self, kind: &ResourceKind) -> Option<&ResourcePool> {
        self.pools.get(kind)
    }

    pub fn available(&self, kind: &ResourceKind) -> u32 {
        self.pools.get(kind).map(|p| p.available()).unwrap_or(0)
    }

    /// Increase `used` by `delta`. The whole delta must fit or nothing
    /// happens.
    pub fn consume(&mut self, kind: &ResourceKind, delta: u32) -> Result<(), ResourceError> {
        let pool = self
            .pools
            .get_mut(kind)
            .ok_or(ResourceError::UnknownResource)?;
        match pool.used.checked_add(delta) {
            Some(next) if next <= pool.capacity() => {
                pool.used = next;
                Ok(())
            }
            _ => Err(ResourceError::InsufficientResource),
        }
    }

    /// Decrease `used` by `delta`. The whole delta must fit or nothing
    /// happens.
    pub fn restore(&mut self, kind: &ResourceKind, delta: u32) -> Result<(), ResourceError> {
        let pool = self
            .pools
            .get_mut(kind)
            .ok_or(ResourceError::UnknownResource)?;
        if delta > pool.used {
            return Err(ResourceError::AtCapacity);
        }
        pool.used -= delta;
        Ok(())
    }

    /// Reset `used` to zero on every pool tagged with the given rest tier.
    /// A long rest also clears short-rest pools.
    pub fn rest(&mut self, kind: RestKind) {
        for pool in self.pools.values_mut() {
            let resets = match (pool.reset_on, kind) {
                (Some(RestKind::Short), _) => true,
                (Some(RestKind::Long), RestKind::Long) => true,
                _ => false,
            };
            if resets {
                pool.used = 0;
            }
        }
    }

    /// Snapshot of spell slots as `(level, max, used, bonus)` tuples,
    /// lowest level first.
    pub fn spell_slots(&self) -> Vec<SpellSlot> {
        let mut slots: Vec<SpellSlot> = self
            .pools
            .iter()
            .filter_map(|(kind, pool)| match kind {
                ResourceKind::SpellSlot { level } => Some(SpellSlot {
                    level: *level,
                    max: pool.max,
                    used: pool.used,
                    bonus: pool.bonus,
                }),
                _ => None,
            })
            .collect();
        slots.sort_by_key(|s| s.level);
        slots
    }

    pub fn currency_gp(&self) -> u32 {
        self.available(&ResourceKind::Currency)
    }
}

/// View of one spell-slot pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlot {
    pub level: u8,
    pub max: u32,
    pub used: u32,
    pub bonus: u32,
}
