use axum::{extract::{Multipart, State}, http::StatusCode, Json};
use tracing::warn;

use crate::{AppState, error::{ApiError, ApiResult}, models::UploadRecord, services::uploads::receive_upload};

const FILE_FIELD: &str = "file";

#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Accept one CSV/XLSX file as multipart field `file`.
///
/// The `storage_key` in the response is the filename to poll `/results` with.
#[utoipa::path(post, path = "/upload", request_body(content = UploadForm, content_type = "multipart/form-data"), responses(
    (status = 201, body = UploadRecord),
    (status = 400, body = crate::error::ApiErrorBody, description = "No file part, empty filename or empty payload"),
    (status = 502, body = crate::error::ApiErrorBody, description = "Storage write failed"),
), tag = "results")]
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<(StatusCode, Json<UploadRecord>)> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error=%e, "upload.multipart_invalid");
                return Err(ApiError::bad_request(format!("invalid multipart body: {e}")));
            }
        };
        if field.name() != Some(FILE_FIELD) { continue; }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(format!("failed to read file part: {e}")))?;
        let record = receive_upload(&state.storage, bytes.to_vec(), &filename).await?;
        return Ok((StatusCode::CREATED, Json(record)));
    }
    Err(ApiError::bad_request("No file part"))
}
