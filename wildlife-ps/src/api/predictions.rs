//! Prediction endpoints
//!
//! POST /api/predictions/upload runs the full upload → predict → persist
//! workflow; the remaining routes read and administer stored records.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use wildlife_common::{Confidence, NewPrediction, Prediction};

use crate::db::PredictionStats;
use crate::error::{ApiError, ApiResult};
use crate::services::UploadedFile;
use crate::AppState;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Pull the `image` field out of the form
///
/// A missing field yields an empty upload, which validation rejects as
/// EMPTY_INPUT.
async fn read_image_field(multipart: &mut Multipart) -> ApiResult<UploadedFile> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Ok(UploadedFile::default())
}

/// POST /api/predictions/upload
///
/// 201 with the stored prediction, or a classified error.
pub async fn upload_and_predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Prediction>)> {
    let mut multipart = multipart?;
    let upload = read_image_field(&mut multipart).await?;
    let prediction = state.orchestrator.upload_and_predict(&upload).await?;
    Ok((StatusCode::CREATED, Json(prediction)))
}

/// GET /api/predictions
pub async fn list_predictions(State(state): State<AppState>) -> ApiResult<Json<Vec<Prediction>>> {
    Ok(Json(state.predictions.find_all().await?))
}

/// GET /api/predictions/:id
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Prediction>> {
    state
        .predictions
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Prediction not found: {}", id)))
}

/// GET /api/predictions/species/:species_id
pub async fn predictions_by_species(
    State(state): State<AppState>,
    Path(species_id): Path<i64>,
) -> ApiResult<Json<Vec<Prediction>>> {
    Ok(Json(state.predictions.find_by_species(species_id).await?))
}

/// GET /api/predictions/model/:version
pub async fn predictions_by_model(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> ApiResult<Json<Vec<Prediction>>> {
    Ok(Json(state.predictions.find_by_model_version(&version).await?))
}

/// Body of POST /api/predictions
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePredictionRequest {
    pub image_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub species_id: i64,
    pub confidence: f64,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl CreatePredictionRequest {
    fn into_new_prediction(self) -> ApiResult<NewPrediction> {
        let confidence = Confidence::new(self.confidence)
            .map_err(|_| ApiError::InvalidConfidence(self.confidence))?;

        Ok(NewPrediction {
            image_name: self.image_name,
            image_url: self.image_url,
            species_id: self.species_id,
            confidence,
            model_version: self.model_version,
        })
    }
}

/// POST /api/predictions
///
/// Records a prediction made elsewhere. Confidence must lie in [0, 1] and
/// the species must exist.
pub async fn create_prediction(
    State(state): State<AppState>,
    request: Result<Json<CreatePredictionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Prediction>)> {
    let Json(request) = request?;
    let request = request.into_new_prediction()?;

    if state.species.find_by_id(request.species_id).await?.is_none() {
        return Err(ApiError::BadRequest(format!(
            "Species not found: {}",
            request.species_id
        )));
    }
    let prediction = state.predictions.save(&request).await?;
    Ok((StatusCode::CREATED, Json(prediction)))
}

/// DELETE /api/predictions/:id
///
/// Removes the record only; the stored image is left for the upload sweep.
pub async fn delete_prediction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.predictions.delete_by_id(id).await? {
        tracing::info!(prediction_id = id, "Prediction deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Prediction not found: {}", id)))
    }
}

/// GET /api/predictions/stats
pub async fn prediction_stats(State(state): State<AppState>) -> ApiResult<Json<PredictionStats>> {
    Ok(Json(state.predictions.stats().await?))
}

/// Build prediction routes
pub fn prediction_routes() -> Router<AppState> {
    Router::new()
        .route("/api/predictions", get(list_predictions).post(create_prediction))
        .route("/api/predictions/upload", post(upload_and_predict))
        .route("/api/predictions/stats", get(prediction_stats))
        .route("/api/predictions/species/:species_id", get(predictions_by_species))
        .route("/api/predictions/model/:version", get(predictions_by_model))
        .route("/api/predictions/:id", get(get_prediction).delete(delete_prediction))
}
