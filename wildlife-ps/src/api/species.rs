//! Species catalog endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use wildlife_common::{NewSpecies, Species};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/species
pub async fn list_species(State(state): State<AppState>) -> ApiResult<Json<Vec<Species>>> {
    Ok(Json(state.species.find_all().await?))
}

/// GET /api/species/:id
pub async fn get_species(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Species>> {
    state
        .species
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Species not found: {}", id)))
}

/// POST /api/species
///
/// 409 when the name is already taken.
pub async fn create_species(
    State(state): State<AppState>,
    request: Result<Json<NewSpecies>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Species>)> {
    let Json(request) = request?;
    let species = state.species.save(&request).await?;
    tracing::info!(species = %species.name, id = species.id, "Species created");
    Ok((StatusCode::CREATED, Json(species)))
}

/// PUT /api/species/:id
pub async fn update_species(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request: Result<Json<NewSpecies>, JsonRejection>,
) -> ApiResult<Json<Species>> {
    let Json(request) = request?;
    state
        .species
        .update(id, &request)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Species not found: {}", id)))
}

/// DELETE /api/species/:id
///
/// 409 while predictions still reference the species.
pub async fn delete_species(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    match state.species.delete_by_id(id).await {
        Ok(true) => {
            tracing::info!(species_id = id, "Species deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(ApiError::NotFound(format!("Species not found: {}", id))),
        Err(e) if e.is_foreign_key_violation() => Err(ApiError::Conflict(format!(
            "Species {} is still referenced by predictions",
            id
        ))),
        Err(e) => Err(e.into()),
    }
}

/// GET /api/species/count
pub async fn species_count(State(state): State<AppState>) -> ApiResult<Json<i64>> {
    Ok(Json(state.species.count().await?))
}

/// Build species routes
pub fn species_routes() -> Router<AppState> {
    Router::new()
        .route("/api/species", get(list_species).post(create_species))
        .route("/api/species/count", get(species_count))
        .route(
            "/api/species/:id",
            get(get_species).put(update_species).delete(delete_species),
        )
}
