#![allow(dead_code)]

use axum::{body::Body, http::{Request, Response}, Router};
use results_plane::{build_router, config::Settings, naming::DerivedNames, storage::{MemoryStore, StorageManager}, AppState};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const BASE: &str = "https://storage.example";

pub struct Harness { pub state: AppState, pub uploads: Arc<MemoryStore>, pub results: Arc<MemoryStore> }

impl Harness {
    pub fn new() -> Self {
        let uploads = Arc::new(MemoryStore::new("uploadscsv", BASE));
        let results = Arc::new(MemoryStore::new("outputscsv", BASE));
        let storage = StorageManager::new(uploads.clone(), results.clone(), BASE);
        Self { state: AppState::new(Settings::default(), storage), uploads, results }
    }

    pub fn app(&self) -> Router { build_router(self.state.clone()) }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.app().oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap()
    }

    /// Everything the pipeline writes for `filename`, with one visualization.
    pub fn publish(&self, filename: &str) {
        let names = DerivedNames::derive(filename);
        self.results.insert(&names.cleaned_name, "a,b\n1,2\n");
        self.results.insert(&names.metadata_key, format!(r#"{{"histogram": "{BASE}/outputscsv/visualizations/hist.png"}}"#));
        self.results.insert(&names.summary_key, "overall summary");
        self.results.insert(&names.visualization_summary_key("histogram"), "histogram summary");
    }
}

pub async fn json(res: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(res: &Response<Body>) -> String {
    res.headers().get("location").unwrap().to_str().unwrap().to_string()
}
