//! # Wildlife Common Library
//!
//! Shared code for the wildlife prediction services:
//! - Error type shared by persistence and configuration code
//! - Configuration resolution (CLI → ENV → TOML → compiled defaults)
//! - Database pool initialization and schema
//! - Domain models (Species, Prediction, Confidence)

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{Confidence, NewPrediction, NewSpecies, Prediction, Species};
