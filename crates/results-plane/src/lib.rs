pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod naming;
pub mod poller;
pub mod services;
pub mod storage;
pub mod telemetry;

use axum::{Router, routing::{get, post}, extract::DefaultBodyLimit, middleware};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

use crate::{
    cache::AvailabilityCache,
    config::Settings,
    services::{ml::MlInspector, results::ResultAssembler},
    storage::StorageManager,
    telemetry::{metrics_handler, track_metrics},
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub storage: StorageManager,
    pub cache: Arc<AvailabilityCache>,
    pub assembler: Arc<ResultAssembler>,
    pub ml: Arc<MlInspector>,
}

impl AppState {
    pub fn new(settings: Settings, storage: StorageManager) -> Self {
        let cache = Arc::new(AvailabilityCache::new(settings.cache));
        let ttl = settings.storage.signed_url_ttl();
        let assembler = Arc::new(ResultAssembler::new(storage.clone(), cache.clone(), settings.poll, ttl));
        let ml = Arc::new(MlInspector::new(storage.clone(), cache.clone(), settings.poll.ml_batch, ttl));
        Self { settings: Arc::new(settings), storage, cache, assembler, ml }
    }

    pub async fn from_settings(settings: Settings) -> Self {
        let storage = StorageManager::from_settings(&settings.storage).await;
        Self::new(settings, storage)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::readiness::readiness,
        handlers::cache::home,
        handlers::cache::debug_cache,
        handlers::uploads::upload_file,
        handlers::results::results,
        handlers::ml::check_ml_visualizations,
        handlers::ml::machine_learning_page,
        handlers::downloads::download,
        handlers::downloads::visualization,
        handlers::downloads::download_summary,
    ),
    components(schemas(
        error::ApiErrorBody,
        handlers::uploads::UploadForm,
        models::UploadRecord,
        models::ResultRecord,
        models::MlAvailabilityRecord,
        models::MlModelArtifacts,
        models::MlPageRecord,
    )),
    tags( (name = "results", description = "Result availability API") )
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();
    let max_body = state.settings.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::cache::home))
        .route("/health", get(handlers::health::health))
        .route("/readyz", get(handlers::readiness::readiness))
        .route("/metrics", get(metrics_handler))
        .route("/upload", post(handlers::uploads::upload_file))
        .route("/results", get(handlers::results::results))
        .route("/check-ml-visualizations", get(handlers::ml::check_ml_visualizations))
        .route("/machinelearning-page", get(handlers::ml::machine_learning_page))
        .route("/download/*key", get(handlers::downloads::download))
        .route("/visualization/*key", get(handlers::downloads::visualization))
        .route("/download-summary/:filename", get(handlers::downloads::download_summary))
        .route("/debug-cache", get(handlers::cache::debug_cache))
        .route("/openapi.json", get(|| async move { axum::Json(openapi.clone()) }))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}
