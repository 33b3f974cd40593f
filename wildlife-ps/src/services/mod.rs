//! Prediction workflow services

pub mod file_ingest;
pub mod orchestrator;
pub mod predictor_client;
pub mod species_resolver;

pub use file_ingest::{FileIngestService, IngestError, StoredFile, UploadedFile};
pub use orchestrator::{PredictionError, PredictionOrchestrator};
pub use predictor_client::{
    HttpPredictorClient, LabelScore, Predictor, PredictorError, PredictorHealth, PredictorResponse,
};
pub use species_resolver::{ResolveError, SpeciesResolver};
