//! Error types for wildlife-ps
//!
//! Every failure reaches the client as
//! `{"error": {"code": <stable tag>, "message": <text>}}`. Storage and
//! database failures get a generic message; details go to the log only.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{IngestError, PredictionError, PredictorError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body larger than the upload limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Conflict (409), e.g. deleting a species that predictions still reference
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Confidence outside [0, 1] in a submitted prediction (422)
    #[error("Confidence must be between 0 and 1, got {0}")]
    InvalidConfidence(f64),

    /// Body could not be read as JSON of the expected shape
    #[error(transparent)]
    Json(#[from] JsonRejection),

    /// Upload request is not a readable multipart form
    #[error(transparent)]
    Multipart(#[from] MultipartRejection),

    /// Classified upload/prediction failure
    #[error(transparent)]
    Prediction(#[from] PredictionError),

    /// Store or configuration error
    #[error(transparent)]
    Common(#[from] wildlife_common::Error),
}

/// Status for each prediction failure kind
pub fn prediction_status(err: &PredictionError) -> StatusCode {
    match err {
        PredictionError::Ingest(e) => match e {
            IngestError::EmptyInput | IngestError::MissingFilename => StatusCode::BAD_REQUEST,
            IngestError::SizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::UnsupportedExtension { .. } | IngestError::UnsupportedContentType(_) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            IngestError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        PredictionError::Predictor(e) => match e {
            PredictorError::Unreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PredictorError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PredictorError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PredictorError::Fault { .. } | PredictorError::Protocol(_) => StatusCode::BAD_GATEWAY,
        },
        PredictionError::InvalidConfidence(_) => StatusCode::BAD_GATEWAY,
        PredictionError::UnknownSpecies(_) | PredictionError::Persistence(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn prediction_message(err: &PredictionError) -> String {
    match err {
        PredictionError::Ingest(IngestError::Io(_)) => "Failed to store uploaded file".to_string(),
        PredictionError::Predictor(PredictorError::Unreachable { .. }) => {
            "ML service is unavailable. Please ensure the ML service is running.".to_string()
        }
        PredictionError::Persistence(_) => "Failed to save prediction".to_string(),
        other => other.to_string(),
    }
}

/// Error code for a request the framework could not extract
fn rejection_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => "SIZE_EXCEEDED",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_CONTENT_TYPE",
        StatusCode::UNPROCESSABLE_ENTITY => "INVALID_INPUT",
        _ => "BAD_REQUEST",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, "SIZE_EXCEEDED", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::InvalidConfidence(value) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_CONFIDENCE",
                format!("Confidence must be between 0 and 1, got {}", value),
            ),
            ApiError::Json(ref rejection) => {
                let status = rejection.status();
                (status, rejection_code(status), rejection.body_text())
            }
            ApiError::Multipart(ref rejection) => {
                let status = rejection.status();
                (status, rejection_code(status), rejection.body_text())
            }
            ApiError::Prediction(ref err) => {
                (prediction_status(err), err.kind(), prediction_message(err))
            }
            ApiError::Common(ref err) => match err {
                wildlife_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
                }
                e if e.is_unique_violation() => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    "A species with this name already exists".to_string(),
                ),
                e if e.is_foreign_key_violation() => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    "Record is referenced by other records or references a missing one".to_string(),
                ),
                e => {
                    tracing::error!(error = %e, "Request failed with internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "Internal server error".to_string(),
                    )
                }
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
