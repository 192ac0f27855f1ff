//! Application services - intent orchestration over the domain

mod encounter_guard;
mod encounter_service;
mod spell_cast_service;

pub use encounter_guard::ConcurrencyGuard;
pub use encounter_service::EncounterService;
pub use spell_cast_service::{
    resolve_cast, validate_cast, CastOutcome, CastValidation, CasterContext,
};
