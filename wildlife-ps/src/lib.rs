//! wildlife-ps library - Wildlife Prediction Service
//!
//! Accepts image uploads, has an external predictor classify them, resolves
//! the predicted label against the species catalog and records the result.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use wildlife_common::config::ServiceConfig;

use crate::db::{PredictionRecordStore, SpeciesCatalog};
use crate::services::file_ingest::UPLOADS_URL_PREFIX;
use crate::services::{FileIngestService, PredictionOrchestrator, Predictor, SpeciesResolver};

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub species: SpeciesCatalog,
    pub predictions: PredictionRecordStore,
    pub ingest: FileIngestService,
    pub orchestrator: Arc<PredictionOrchestrator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire every component from one configuration value
    pub fn new(
        db: SqlitePool,
        config: ServiceConfig,
        predictor: Arc<dyn Predictor>,
    ) -> std::io::Result<Self> {
        let species = SpeciesCatalog::new(db.clone());
        let predictions = PredictionRecordStore::new(db);
        let ingest = FileIngestService::new(&config)?;
        let resolver = SpeciesResolver::new(species.clone(), config.auto_create_species);

        let orchestrator = PredictionOrchestrator::new(
            ingest.clone(),
            predictor,
            resolver,
            predictions.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            species,
            predictions,
            ingest,
            orchestrator: Arc::new(orchestrator),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let uploads = ServeDir::new(state.ingest.upload_dir());

    Router::new()
        .merge(api::prediction_routes())
        .merge(api::species_routes())
        .merge(api::health_routes())
        .nest_service(UPLOADS_URL_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
