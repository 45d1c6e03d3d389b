use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use crate::{error::ResultsError, models::UploadRecord, storage::StorageManager, telemetry::UPLOAD_BYTES};

/// Final path component of a client-supplied filename; browsers on some platforms send full paths.
pub fn sanitize_filename(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim()
}

/// Store an uploaded file under `{uuid}_{filename}` in the upload area.
///
/// The returned `storage_key` is the filename the client polls results for.
#[tracing::instrument(level="info", skip(storage, bytes), fields(size=bytes.len()))]
pub async fn receive_upload(storage: &StorageManager, bytes: Vec<u8>, original_filename: &str) -> Result<UploadRecord, ResultsError> {
    let name = sanitize_filename(original_filename);
    if name.is_empty() { return Err(ResultsError::InvalidUpload("missing filename")); }
    if bytes.is_empty() { return Err(ResultsError::InvalidUpload("empty file")); }

    let storage_key = format!("{}_{name}", Uuid::new_v4());
    let sha256 = hex::encode(Sha256::digest(&bytes));
    let size_bytes = bytes.len() as u64;
    if let Err(e) = storage.uploads().put(&storage_key, bytes).await {
        error!(key=%storage_key, error=%e, "upload.store_failed");
        return Err(ResultsError::UploadFailed(e.to_string()));
    }
    UPLOAD_BYTES.inc_by(size_bytes);
    info!(key=%storage_key, %sha256, "upload.stored");
    Ok(UploadRecord { storage_key, original_filename: name.to_string(), size_bytes, sha256, uploaded_at: Utc::now() })
}
