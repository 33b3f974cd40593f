//! Domain models shared between the catalog, the prediction store and the API
//!
//! Species and Prediction mirror the `species` and `predictions` tables.
//! `New*` types are insert payloads: they carry no id and no timestamps,
//! which the store assigns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum stored length of a species description
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Description given to species inserted by the resolver rather than by an operator
pub const AUTO_CREATED_DESCRIPTION: &str = "Auto-created from ML prediction";

/// Catalog entry for a classifiable wildlife category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: i64,
    /// Scientific name, unique across the catalog
    pub name: String,
    pub common_name: Option<String>,
    pub description: Option<String>,
    pub active: bool,
}

/// Species insert/update payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSpecies {
    pub name: String,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewSpecies {
    /// Species as the resolver creates it for a label the catalog has never seen
    pub fn auto_created(label: &str) -> Self {
        Self {
            name: label.to_string(),
            common_name: Some(label.to_string()),
            description: Some(AUTO_CREATED_DESCRIPTION.to_string()),
            active: true,
        }
    }

    /// Reject blank names and over-long descriptions
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Species name is required".to_string()));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(Error::InvalidInput(format!(
                    "Species description exceeds {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Predictor-reported score, guaranteed to lie in [0.0, 1.0]
///
/// A `NewPrediction` can only be built from a `Confidence`, so an
/// out-of-range value never reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidInput(format!(
                "Confidence must be between 0 and 1, got {}",
                value
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

/// Immutable record of one classification outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: i64,
    /// Original filename as uploaded
    pub image_name: String,
    /// Public path of the stored image
    pub image_url: Option<String>,
    pub predicted_species: Species,
    pub confidence: f64,
    pub model_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Prediction insert payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrediction {
    pub image_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub species_id: i64,
    pub confidence: Confidence,
    #[serde(default)]
    pub model_version: Option<String>,
}
