//! HTTP API handlers for wildlife-ps

pub mod health;
pub mod predictions;
pub mod species;

pub use health::health_routes;
pub use predictions::prediction_routes;
pub use species::species_routes;
