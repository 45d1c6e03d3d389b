use axum::{extract::{Path, Query, State}, response::Redirect};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{AppState, error::{ApiError, ApiResult}};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// `lr`, `dt` or `rf`
    pub summary_type: Option<String>,
}

async fn redirect_to_signed(state: &AppState, key: &str) -> ApiResult<Redirect> {
    let url = state.storage.sign_result(key, state.settings.storage.signed_url_ttl()).await?;
    Ok(Redirect::to(&url))
}

/// Redirect to a short-lived download link for a results-area object.
#[utoipa::path(get, path = "/download/{key}", params(("key" = String, Path, description = "Results-area key")), responses(
    (status = 303, description = "Signed URL"),
    (status = 502, body = crate::error::ApiErrorBody),
), tag = "results")]
#[tracing::instrument(skip(state))]
pub async fn download(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Redirect> {
    redirect_to_signed(&state, &key).await
}

#[utoipa::path(get, path = "/visualization/{key}", params(("key" = String, Path, description = "Visualization image key")), responses(
    (status = 303, description = "Signed URL"),
    (status = 502, body = crate::error::ApiErrorBody),
), tag = "results")]
#[tracing::instrument(skip(state))]
pub async fn visualization(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Redirect> {
    redirect_to_signed(&state, &key).await
}

/// Redirect to one ML model summary of an uploaded file.
#[utoipa::path(get, path = "/download-summary/{filename}", params(("filename" = String, Path, description = "Uploaded filename"), SummaryQuery), responses(
    (status = 303, description = "Signed URL"),
    (status = 400, body = crate::error::ApiErrorBody, description = "Unknown summary type"),
    (status = 502, body = crate::error::ApiErrorBody),
), tag = "results")]
#[tracing::instrument(skip(state))]
pub async fn download_summary(State(state): State<AppState>, Path(filename): Path<String>, Query(q): Query<SummaryQuery>) -> ApiResult<Redirect> {
    let code = q.summary_type.as_deref().unwrap_or_default();
    match state.ml.summary_download_url(&filename, code).await? {
        Some(url) => Ok(Redirect::to(&url)),
        None => Err(ApiError::bad_request("Invalid summary type")),
    }
}
