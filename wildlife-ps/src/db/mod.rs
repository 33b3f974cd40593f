//! Persistence for wildlife-ps
//!
//! Thin stores over the shared SQLite pool. Constraint enforcement (unique
//! species names, confidence range, species foreign key) is left to the
//! schema in `wildlife_common::db`.

pub mod predictions;
pub mod species;

pub use predictions::{PredictionRecordStore, PredictionStats};
pub use species::SpeciesCatalog;
