use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReadinessResponse { pub status: &'static str }

const PROBE_KEY: &str = "readyz-probe";

/// Readiness probe: one existence check against the results area.
#[utoipa::path(get, path = "/readyz", responses(
	(status = 200, body = ReadinessResponse, description = "Service ready"),
	(status = 503, body = ReadinessResponse, description = "Storage not reachable")
))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
	match state.storage.results().exists(PROBE_KEY).await {
		Ok(_) => (StatusCode::OK, Json(ReadinessResponse { status: "ready" })),
		Err(e) => {
			tracing::warn!(error=%e, "readyz.storage_unreachable");
			(StatusCode::SERVICE_UNAVAILABLE, Json(ReadinessResponse { status: "degraded" }))
		}
	}
}
