//! Content Catalog port - read-only spell and monster reference data

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::SpellDefinition;
use crate::domain::value_objects::{MonsterId, SpellId};

/// A monster's base stats as published in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterDefinition {
    pub id: MonsterId,
    pub name: String,
    pub armor_class: i32,
    pub hit_points: i32,
    pub attack_bonus: i32,
    pub dexterity_modifier: i32,
    pub passive_perception: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("spell {0} not found in catalog")]
    SpellNotFound(SpellId),
    #[error("monster {0} not found in catalog")]
    MonsterNotFound(MonsterId),
}

/// Outbound port to the Content Catalog. Never written by the engine.
#[async_trait]
pub trait ContentCatalogPort: Send + Sync {
    async fn get_spell(&self, spell_id: SpellId) -> Result<SpellDefinition, CatalogError>;

    async fn get_monster(&self, monster_id: MonsterId)
        -> Result<MonsterDefinition, CatalogError>;
}
