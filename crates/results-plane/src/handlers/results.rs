use axum::{extract::{Query, State}, Json};

use crate::{AppState, error::{ApiError, ApiResult}, handlers::FilenameQuery, models::ResultRecord};

/// Wait for the processed artifacts of an upload and return links and summaries.
///
/// Blocks for up to the configured poll deadlines on a cold cache.
#[utoipa::path(get, path = "/results", params(FilenameQuery), responses(
    (status = 200, body = ResultRecord),
    (status = 400, body = crate::error::ApiErrorBody, description = "Missing filename"),
    (status = 502, body = crate::error::ApiErrorBody, description = "Artifacts never appeared or could not be read"),
), tag = "results")]
#[tracing::instrument(skip(state))]
pub async fn results(State(state): State<AppState>, Query(q): Query<FilenameQuery>) -> ApiResult<Json<ResultRecord>> {
    let filename = q.get().ok_or_else(|| ApiError::bad_request("filename query parameter required"))?;
    let record = state.assembler.assemble(filename).await?;
    Ok(Json((*record).clone()))
}
