//! External predictor client
//!
//! The predictor is an independently deployed HTTP service:
//! - `POST {base}/predict`, multipart field `image` → prediction JSON
//! - `GET {base}/health` → availability, optionally model status
//!
//! Every failure is classified into a `PredictorError` variant so callers
//! can choose a response without looking at message text.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use wildlife_common::config::ServiceConfig;

const USER_AGENT: &str = concat!("wildlife-ps/", env!("CARGO_PKG_VERSION"));

/// Longest error detail carried over from a predictor response
pub const MAX_DETAIL_CHARS: usize = 500;

/// Predictor failure classification
#[derive(Debug, Error)]
pub enum PredictorError {
    /// Connection refused, DNS failure, service down
    #[error("ML service is unavailable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// No complete response within the configured timeout
    #[error("ML service did not respond within {} ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// 4xx: the predictor considers the input itself bad
    #[error("ML service rejected the request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// 5xx: inference failed on the predictor side
    #[error("ML service encountered an error ({status}): {detail}")]
    Fault { status: u16, detail: String },

    /// Reachable, but the reply was empty, undecodable or incomplete
    #[error("ML service returned an invalid response: {0}")]
    Protocol(String),
}

/// One ranked alternative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    #[serde(rename = "species")]
    pub label: String,
    pub confidence: f64,
}

/// Validated predictor reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictorResponse {
    pub predicted_label: String,
    pub confidence: f64,
    pub is_confident: bool,
    /// Alternatives, most likely first
    pub top_k: Vec<LabelScore>,
    pub model_version: Option<String>,
    pub timestamp: Option<String>,
}

/// Wire format of `POST /predict`; nothing is trusted until `into_response`
#[derive(Debug, Deserialize)]
struct RawPredictionResponse {
    predicted_species: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    is_confident: Option<bool>,
    #[serde(default)]
    top_predictions: Option<Vec<LabelScore>>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl RawPredictionResponse {
    fn into_response(self) -> Result<PredictorResponse, PredictorError> {
        let predicted_label = self
            .predicted_species
            .filter(|label| !label.trim().is_empty())
            .ok_or_else(|| PredictorError::Protocol("missing predicted_species".to_string()))?;

        let confidence = self
            .confidence
            .filter(|c| c.is_finite())
            .ok_or_else(|| PredictorError::Protocol("missing confidence".to_string()))?;

        Ok(PredictorResponse {
            predicted_label,
            confidence,
            is_confident: self.is_confident.unwrap_or(false),
            top_k: self.top_predictions.unwrap_or_default(),
            model_version: self.model_version.filter(|v| !v.trim().is_empty()),
            timestamp: self.timestamp,
        })
    }
}

/// Result of the health probe
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictorHealth {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_loaded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHealthResponse {
    #[serde(default)]
    model_loaded: Option<bool>,
    #[serde(default)]
    model_version: Option<String>,
}

/// Image classification backend
///
/// The orchestrator only sees this trait, so the HTTP client can be swapped
/// for a queued implementation or a test stub.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Classify one image
    async fn predict(&self, image: &[u8], filename: &str) -> Result<PredictorResponse, PredictorError>;

    /// Best-effort probe; never fails, reports unavailability instead
    async fn health(&self) -> PredictorHealth;

    async fn health_check(&self) -> bool {
        self.health().await.available
    }
}

/// `Predictor` over HTTP
pub struct HttpPredictorClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPredictorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> reqwest::Result<Self> {
        Self::new(config.predictor_url.clone(), config.predictor_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify_transport_error(&self, url: &str, err: reqwest::Error) -> PredictorError {
        if err.is_timeout() {
            PredictorError::Timeout { timeout: self.timeout }
        } else if err.is_decode() {
            PredictorError::Protocol(err.to_string())
        } else {
            // Connect, DNS, reset mid-request: the service is not usable
            PredictorError::Unreachable {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Predictor for HttpPredictorClient {
    async fn predict(&self, image: &[u8], filename: &str) -> Result<PredictorResponse, PredictorError> {
        let url = format!("{}/predict", self.base_url);

        let part = Part::bytes(image.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime_for_filename(filename))
            .map_err(|e| PredictorError::Protocol(e.to_string()))?;
        let form = Form::new().part("image", part);

        tracing::debug!(url = %url, filename, bytes = image.len(), "Calling predictor");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(&url, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify_transport_error(&url, e))?;

        if status.is_client_error() {
            return Err(PredictorError::Rejected {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        if status.is_server_error() {
            return Err(PredictorError::Fault {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        if status != StatusCode::OK {
            return Err(PredictorError::Protocol(format!("unexpected status {}", status)));
        }
        if body.is_empty() {
            return Err(PredictorError::Protocol("empty response body".to_string()));
        }

        let raw: RawPredictionResponse = serde_json::from_slice(&body)
            .map_err(|e| PredictorError::Protocol(e.to_string()))?;
        let prediction = raw.into_response()?;

        tracing::info!(
            label = %prediction.predicted_label,
            confidence = prediction.confidence,
            model_version = prediction.model_version.as_deref().unwrap_or("unknown"),
            "Predictor responded"
        );

        Ok(prediction)
    }

    async fn health(&self) -> PredictorHealth {
        let url = format!("{}/health", self.base_url);

        let response = match self.http_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Predictor health probe failed");
                return PredictorHealth::default();
            }
        };

        if response.status() != StatusCode::OK {
            return PredictorHealth::default();
        }

        // Body is optional: an OK without JSON still counts as available
        let raw: RawHealthResponse = response.json().await.unwrap_or_default();
        PredictorHealth {
            available: true,
            model_loaded: raw.model_loaded,
            model_version: raw.model_version,
        }
    }
}

/// Content type for the multipart part, from the filename extension
fn mime_for_filename(filename: &str) -> &'static str {
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Human-readable detail from an error body, bounded to `MAX_DETAIL_CHARS`
///
/// Prefers a JSON `detail` string (FastAPI style), falls back to raw text.
fn error_detail(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let detail = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| text.trim().to_string());
    truncate_chars(&detail, MAX_DETAIL_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
