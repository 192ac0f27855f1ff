//! Outbound ports - contracts the engine consumes from collaborators

mod character_directory_port;
mod content_catalog_port;
mod encounter_store_port;

pub use character_directory_port::{
    CharacterDirectoryPort, CombatantPatch, CombatantRecord, DirectoryError,
    DirectoryWriteOutcome,
};
pub use content_catalog_port::{CatalogError, ContentCatalogPort, MonsterDefinition};
pub use encounter_store_port::{EncounterStorePort, StoreError};
