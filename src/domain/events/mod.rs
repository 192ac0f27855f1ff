//! Domain events - ordered notifications of accepted state changes

mod delta;

pub use delta::{DeltaEvent, DeltaKind};
