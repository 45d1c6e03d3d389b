use indexmap::IndexMap;
use std::{collections::HashMap, sync::{Arc, Mutex}, time::Duration};
use tracing::{info, warn};

use crate::{
    cache::AvailabilityCache,
    config::PollSettings,
    error::{ArtifactKind, ResultsError},
    models::ResultRecord,
    naming::{storage_key_from_public_url, DerivedNames},
    poller::poll,
    storage::StorageManager,
};

pub const SUMMARY_MISSING: &str = "Summary not found.";
pub const VISUALIZATION_SUMMARY_MISSING: &str = "Summary not found. It might still be processing.";

/// Membership in the per-file queue; the map entry goes with the last member, also on cancellation.
struct Flight<'a> { owner: &'a ResultAssembler, key: String, mutex: Arc<tokio::sync::Mutex<()>> }

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut map = self.owner.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        // the map holds one reference, this member the other
        if map.get(&self.key).is_some_and(|m| Arc::ptr_eq(m, &self.mutex) && Arc::strong_count(m) == 2) {
            map.remove(&self.key);
        }
    }
}

/// Waits for every artifact of one upload and folds them into a [`ResultRecord`].
pub struct ResultAssembler {
    storage: StorageManager,
    cache: Arc<AvailabilityCache>,
    poll: PollSettings,
    signed_url_ttl: Duration,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResultAssembler {
    pub fn new(storage: StorageManager, cache: Arc<AvailabilityCache>, poll: PollSettings, signed_url_ttl: Duration) -> Self {
        Self { storage, cache, poll, signed_url_ttl, in_flight: Mutex::new(HashMap::new()) }
    }

    /// Cached record if complete, otherwise poll storage and build one.
    ///
    /// Callers for the same file (raw or `cleaned_` name) queue behind a single
    /// assembly and pick up its cached result.
    #[tracing::instrument(level="info", skip(self))]
    pub async fn assemble(&self, filename: &str) -> Result<Arc<ResultRecord>, ResultsError> {
        if let Some(hit) = self.cache.complete_result(filename) {
            info!("results.cache_hit");
            return Ok(hit);
        }
        let names = DerivedNames::derive(filename);
        let flight = self.flight(&names.cleaned_name);
        let _guard = flight.mutex.lock().await;
        match self.cache.complete_result(filename) {
            Some(hit) => { info!("results.coalesced"); Ok(hit) }
            None => self.build(&names).await,
        }
    }

    fn flight(&self, key: &str) -> Flight<'_> {
        let mutex = self.in_flight.lock().unwrap_or_else(|p| p.into_inner()).entry(key.to_string()).or_default().clone();
        Flight { owner: self, key: key.to_string(), mutex }
    }

    async fn build(&self, names: &DerivedNames) -> Result<Arc<ResultRecord>, ResultsError> {
        let results = self.storage.results();

        info!(key=%names.cleaned_name, "results.waiting_cleaned_csv");
        if !poll(ArtifactKind::CleanedCsv.as_str(), self.poll.cleaned_csv, || results.exists(&names.cleaned_name)).await {
            return Err(ResultsError::ArtifactTimeout(ArtifactKind::CleanedCsv));
        }

        info!(key=%names.metadata_key, "results.waiting_metadata");
        if !poll(ArtifactKind::Metadata.as_str(), self.poll.metadata, || results.exists(&names.metadata_key)).await {
            return Err(ResultsError::ArtifactTimeout(ArtifactKind::Metadata));
        }
        let raw = results.read_text(&names.metadata_key).await.map_err(|e| ResultsError::StorageTransient(e.to_string()))?;
        let visualizations: IndexMap<String, String> = serde_json::from_str(&raw).map_err(|e| ResultsError::MetadataParse(e.to_string()))?;
        info!(count=visualizations.len(), names=?visualizations.keys().collect::<Vec<_>>(), "results.metadata_loaded");

        let summary = if results.exists(&names.summary_key).await.map_err(|e| ResultsError::StorageTransient(e.to_string()))? {
            results.read_text(&names.summary_key).await.map_err(|e| ResultsError::StorageTransient(e.to_string()))?
        } else {
            SUMMARY_MISSING.to_string()
        };

        let mut visualization_summaries = IndexMap::new();
        for vis_name in visualizations.keys() {
            let key = names.visualization_summary_key(vis_name);
            let text = self.visualization_summary(&key).await;
            visualization_summaries.insert(vis_name.clone(), text);
        }

        let prefix = self.storage.results_public_prefix();
        let mut visualization_signed_urls = IndexMap::new();
        for (vis_name, url) in &visualizations {
            let key = storage_key_from_public_url(url, &prefix);
            visualization_signed_urls.insert(vis_name.clone(), self.sign(&key).await?);
        }

        let record = ResultRecord {
            cleaned_csv_url: Some(self.storage.results_public_url(&names.cleaned_name)),
            cleaned_csv_signed_url: Some(self.sign(&names.cleaned_name).await?),
            summary: Some(summary),
            visualization_signed_urls,
            visualization_summaries,
            original_filename: names.original.clone(),
            ml: None,
        };
        let record = self.cache.insert_result(&names.original, &names.cleaned_name, record);
        info!(filename=%names.original, cleaned=%names.cleaned_name, "results.cached");
        Ok(record)
    }

    async fn visualization_summary(&self, key: &str) -> String {
        let results = self.storage.results();
        if !poll("visualization_summary", self.poll.visualization_summary, || results.exists(key)).await {
            return VISUALIZATION_SUMMARY_MISSING.to_string();
        }
        match results.read_text(key).await {
            Ok(text) => text,
            Err(e) => { warn!(key, error=%e, "results.summary_read_failed"); VISUALIZATION_SUMMARY_MISSING.to_string() }
        }
    }

    async fn sign(&self, key: &str) -> Result<String, ResultsError> {
        self.storage.sign_result(key, self.signed_url_ttl).await
    }
}
