use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct HomeResponse { pub status: &'static str }

/// Landing route. Drops every cached result so the next lookup re-polls storage.
#[utoipa::path(get, path = "/", responses( (status = 200, body = HomeResponse) ), tag = "results")]
#[tracing::instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> Json<HomeResponse> {
    state.cache.clear();
    info!("cache.reset_on_home");
    Json(HomeResponse { status: "ok" })
}

/// Cache keys mapped to the fields populated on each record.
#[utoipa::path(get, path = "/debug-cache", responses( (status = 200, description = "Cache key to populated field names") ), tag = "results")]
pub async fn debug_cache(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<&'static str>>> {
    Json(state.cache.snapshot())
}
