//! Domain aggregates - consistency boundaries owning related entities

mod encounter_state;

pub use encounter_state::EncounterState;
