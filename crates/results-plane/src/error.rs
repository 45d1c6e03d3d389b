use axum::{response::{IntoResponse, Response}, Json, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use std::fmt::{Display, Formatter};

/// Artifact classes whose absence after polling is fatal to an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind { CleanedCsv, Metadata }

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self { Self::CleanedCsv => "cleaned_csv", Self::Metadata => "metadata" }
    }
    pub fn label(self) -> &'static str {
        match self { Self::CleanedCsv => "Cleaned CSV file", Self::Metadata => "Visualization metadata" }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("failed to upload file: {0}")] UploadFailed(String),
    #[error("{} not found after waiting", .0.label())]
    ArtifactTimeout(ArtifactKind),
    #[error("visualization metadata is not valid JSON: {0}")] MetadataParse(String),
    #[error("failed to generate download link: {0}")] Signing(String),
    /// Storage failure outside a poll. Inside a poll the same failure is logged and retried.
    #[error("storage unavailable: {0}")] StorageTransient(String),
    #[error("{0}")] InvalidUpload(&'static str),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct ApiError { pub status: StatusCode, pub code: &'static str, pub message: String, pub redirect: Option<&'static str> }

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), redirect: None }
    }
    pub fn bad_request(msg: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, "bad_request", msg) }
    /// The one failure shape every domain error is reported as; the client goes back to `redirect`.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self { redirect: Some("/"), ..Self::new(StatusCode::BAD_GATEWAY, "failed", msg) }
    }
}

impl From<ResultsError> for ApiError {
    fn from(e: ResultsError) -> Self {
        match e {
            ResultsError::InvalidUpload(msg) => Self::bad_request(msg),
            other => Self::failed(other.to_string()),
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}: {}", self.code, self.message) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody { code: self.code, message: self.message, redirect: self.redirect };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
