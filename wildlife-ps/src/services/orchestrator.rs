//! Upload → predict → resolve → persist
//!
//! Steps run strictly in order and the first failure aborts the request.
//! Nothing is retried. A file stored in step 1 is kept when a later step
//! fails; orphaned uploads are left for an external sweep.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use wildlife_common::{Confidence, NewPrediction, Prediction};

use crate::db::PredictionRecordStore;
use crate::services::file_ingest::{FileIngestService, IngestError, UploadedFile, PREDICTIONS_SUBDIR};
use crate::services::predictor_client::{Predictor, PredictorError};
use crate::services::species_resolver::{ResolveError, SpeciesResolver};

/// Classified failure of an upload request
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Predictor(#[from] PredictorError),

    #[error("Species '{0}' not found in database. Auto-create is disabled. Please add this species manually.")]
    UnknownSpecies(String),

    /// Predictor reported a score outside [0, 1]
    #[error("ML service reported confidence {0} outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("Failed to persist prediction: {0}")]
    Persistence(#[source] wildlife_common::Error),
}

impl From<ResolveError> for PredictionError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnknownSpecies(label) => PredictionError::UnknownSpecies(label),
            ResolveError::Store(e) => PredictionError::Persistence(e),
        }
    }
}

impl PredictionError {
    /// Stable tag for clients and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Ingest(e) => match e {
                IngestError::EmptyInput => "EMPTY_INPUT",
                IngestError::SizeExceeded { .. } => "SIZE_EXCEEDED",
                IngestError::MissingFilename => "MISSING_FILENAME",
                IngestError::UnsupportedExtension { .. } => "UNSUPPORTED_EXTENSION",
                IngestError::UnsupportedContentType(_) => "UNSUPPORTED_CONTENT_TYPE",
                IngestError::Io(_) => "STORAGE_FAILURE",
            },
            PredictionError::Predictor(e) => match e {
                PredictorError::Unreachable { .. } => "PREDICTOR_UNREACHABLE",
                PredictorError::Timeout { .. } => "PREDICTOR_TIMEOUT",
                PredictorError::Rejected { .. } => "PREDICTOR_REJECTED",
                PredictorError::Fault { .. } => "PREDICTOR_FAULT",
                PredictorError::Protocol(_) => "PREDICTOR_PROTOCOL_ERROR",
            },
            PredictionError::UnknownSpecies(_) => "UNKNOWN_SPECIES",
            PredictionError::InvalidConfidence(_) => "INVALID_CONFIDENCE",
            PredictionError::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }
}

/// Single entry point for "submit image for prediction"
pub struct PredictionOrchestrator {
    ingest: FileIngestService,
    predictor: Arc<dyn Predictor>,
    resolver: SpeciesResolver,
    predictions: PredictionRecordStore,
}

impl PredictionOrchestrator {
    pub fn new(
        ingest: FileIngestService,
        predictor: Arc<dyn Predictor>,
        resolver: SpeciesResolver,
        predictions: PredictionRecordStore,
    ) -> Self {
        Self {
            ingest,
            predictor,
            resolver,
            predictions,
        }
    }

    pub fn predictor(&self) -> &Arc<dyn Predictor> {
        &self.predictor
    }

    #[tracing::instrument(name = "upload_and_predict", skip_all, fields(upload_id = %Uuid::new_v4()))]
    pub async fn upload_and_predict(&self, file: &UploadedFile) -> Result<Prediction, PredictionError> {
        let result = self.run(file).await;
        match &result {
            Ok(prediction) => tracing::info!(
                prediction_id = prediction.id,
                species = %prediction.predicted_species.name,
                confidence = prediction.confidence,
                "Prediction recorded"
            ),
            Err(e) => tracing::warn!(kind = e.kind(), error = %e, "Upload failed"),
        }
        result
    }

    async fn run(&self, file: &UploadedFile) -> Result<Prediction, PredictionError> {
        // 1. Validate and store; nothing below runs for a rejected upload
        let stored = self.ingest.store(file, PREDICTIONS_SUBDIR).await?;
        tracing::debug!(path = %stored.path.display(), "Upload stored");

        // 2. Classify. On failure the stored file stays on disk.
        let response = self
            .predictor
            .predict(&file.bytes, &stored.stored_filename)
            .await?;

        // Checked before resolving so a bad reply cannot auto-create a species
        let confidence = Confidence::new(response.confidence)
            .map_err(|_| PredictionError::InvalidConfidence(response.confidence))?;

        // 3. Resolve the label against the catalog
        let species = self.resolver.resolve(&response.predicted_label).await?;

        // 4. Single insert, the only row this request writes to predictions
        let record = NewPrediction {
            image_name: stored.original_filename.clone(),
            image_url: Some(stored.public_path()),
            species_id: species.id,
            confidence,
            model_version: response.model_version,
        };

        self.predictions
            .save(&record)
            .await
            .map_err(PredictionError::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(PredictionError::from(IngestError::EmptyInput).kind(), "EMPTY_INPUT");
        assert_eq!(
            PredictionError::from(PredictorError::Protocol("x".into())).kind(),
            "PREDICTOR_PROTOCOL_ERROR"
        );
        assert_eq!(
            PredictionError::from(ResolveError::UnknownSpecies("lion".into())).kind(),
            "UNKNOWN_SPECIES"
        );
        assert_eq!(PredictionError::InvalidConfidence(1.5).kind(), "INVALID_CONFIDENCE");
    }
}
