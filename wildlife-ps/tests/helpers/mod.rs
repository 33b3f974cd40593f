//! Shared test fixtures
//!
//! Stub predictor with a call counter, app state over an in-memory database
//! and a temporary upload root, and a multipart body builder.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wildlife_common::config::ServiceConfig;
use wildlife_common::db::init_in_memory_pool;
use wildlife_ps::services::{
    LabelScore, Predictor, PredictorError, PredictorHealth, PredictorResponse,
};
use wildlife_ps::AppState;

type Reply = Box<dyn Fn() -> Result<PredictorResponse, PredictorError> + Send + Sync>;

/// Predictor that returns a canned reply and counts calls
pub struct StubPredictor {
    reply: Reply,
    available: bool,
    calls: AtomicUsize,
}

impl StubPredictor {
    pub fn responding(label: &str, confidence: f64, model_version: &str) -> Arc<Self> {
        let response = prediction_response(label, confidence, model_version);
        Arc::new(Self {
            reply: Box::new(move || Ok(response.clone())),
            available: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing<F>(make_error: F) -> Arc<Self>
    where
        F: Fn() -> PredictorError + Send + Sync + 'static,
    {
        Arc::new(Self {
            reply: Box::new(move || Err(make_error())),
            available: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn connection_refused() -> Arc<Self> {
        Self::failing(|| PredictorError::Unreachable {
            url: "http://127.0.0.1:1/predict".to_string(),
            reason: "Connection refused (os error 111)".to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Predictor for StubPredictor {
    async fn predict(&self, _image: &[u8], _filename: &str) -> Result<PredictorResponse, PredictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)()
    }

    async fn health(&self) -> PredictorHealth {
        PredictorHealth {
            available: self.available,
            model_loaded: self.available.then_some(true),
            model_version: None,
        }
    }
}

pub fn prediction_response(label: &str, confidence: f64, model_version: &str) -> PredictorResponse {
    PredictorResponse {
        predicted_label: label.to_string(),
        confidence,
        is_confident: confidence >= 0.5,
        top_k: vec![LabelScore {
            label: label.to_string(),
            confidence,
        }],
        model_version: Some(model_version.to_string()),
        timestamp: Some("2024-01-01T12:00:00".to_string()),
    }
}

pub fn test_config(upload_dir: &Path, auto_create_species: bool) -> ServiceConfig {
    ServiceConfig {
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes: 1024,
        auto_create_species,
        predictor_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// App state over a fresh in-memory database; keep the TempDir alive
pub async fn test_state(auto_create_species: bool, predictor: Arc<dyn Predictor>) -> (TempDir, AppState) {
    let upload_dir = TempDir::new().unwrap();
    let pool = init_in_memory_pool().await.unwrap();
    let state = AppState::new(pool, test_config(upload_dir.path(), auto_create_species), predictor).unwrap();
    (upload_dir, state)
}

/// Number of files under `<upload root>/predictions`
pub fn stored_file_count(upload_dir: &Path) -> usize {
    match std::fs::read_dir(upload_dir.join("predictions")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

pub const BOUNDARY: &str = "----wildlife-test-boundary";

/// multipart/form-data body with one file field
pub fn multipart_body(field: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// A few bytes that look like the start of a JPEG
pub fn jpeg_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F']
}
