use axum::{extract::{Query, State}, Json};

use crate::{AppState, error::{ApiError, ApiResult}, handlers::FilenameQuery, models::{MlAvailabilityRecord, MlPageRecord}};

/// Whether any ML plot and summary exist for a file yet. Polls for a short window.
#[utoipa::path(get, path = "/check-ml-visualizations", params(FilenameQuery), responses(
    (status = 200, body = MlAvailabilityRecord),
), tag = "results")]
#[tracing::instrument(skip(state))]
pub async fn check_ml_visualizations(State(state): State<AppState>, Query(q): Query<FilenameQuery>) -> Json<MlAvailabilityRecord> {
    let Some(filename) = q.get() else {
        return Json(MlAvailabilityRecord::default());
    };
    Json((*state.ml.check_availability(filename).await).clone())
}

#[utoipa::path(get, path = "/machinelearning-page", params(FilenameQuery), responses(
    (status = 200, body = MlPageRecord),
    (status = 400, body = crate::error::ApiErrorBody, description = "Missing filename"),
    (status = 502, body = crate::error::ApiErrorBody),
), tag = "results")]
#[tracing::instrument(skip(state))]
pub async fn machine_learning_page(State(state): State<AppState>, Query(q): Query<FilenameQuery>) -> ApiResult<Json<MlPageRecord>> {
    let filename = q.get().ok_or_else(|| ApiError::bad_request("filename query parameter required"))?;
    Ok(Json(state.ml.page(filename).await?))
}
