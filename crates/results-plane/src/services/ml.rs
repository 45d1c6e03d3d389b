use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::{
    cache::AvailabilityCache,
    error::ResultsError,
    models::{MlAvailabilityRecord, MlPageRecord},
    naming::{base_name, DerivedNames, MlModel},
    poller::{poll_all, PollProfile},
    storage::StorageManager,
};

/// ML artifact lookups: availability polling, the per-model page and summary downloads.
pub struct MlInspector {
    storage: StorageManager,
    cache: Arc<AvailabilityCache>,
    profile: PollProfile,
    signed_url_ttl: Duration,
}

impl MlInspector {
    pub fn new(storage: StorageManager, cache: Arc<AvailabilityCache>, profile: PollProfile, signed_url_ttl: Duration) -> Self {
        Self { storage, cache, profile, signed_url_ttl }
    }

    /// Poll the three plots and three summaries for `filename`.
    ///
    /// Available once at least one plot and one summary have been seen. Never
    /// fails: storage errors only delay discovery. The record is cached under
    /// the exact `filename` given, whatever its outcome.
    #[tracing::instrument(level="info", skip(self))]
    pub async fn check_availability(&self, filename: &str) -> Arc<MlAvailabilityRecord> {
        if let Some(hit) = self.cache.ml(filename) {
            info!("ml.cache_hit");
            return hit;
        }
        let DerivedNames { base_name: base, ml_plot_keys: plots, ml_summary_keys: summaries, .. } = DerivedNames::derive(filename);
        let checked_paths: Vec<String> = plots.iter().chain(summaries.iter()).cloned().collect();

        let results = self.storage.results();
        let found = poll_all("ml_batch", self.profile, checked_paths.len(), |i| results.exists(&checked_paths[i])).await;

        // discovery order; ties within a tick keep declared order
        let seen = |offset: usize, keys: &[String]| -> Vec<String> {
            let mut hits: Vec<(u64, &String)> = keys.iter().enumerate()
                .filter_map(|(i, k)| found[offset + i].map(|tick| (tick, k))).collect();
            hits.sort_by_key(|(tick, _)| *tick);
            hits.into_iter().map(|(_, k)| k.clone()).collect()
        };
        let found_files = seen(0, &plots);
        let found_summaries = seen(plots.len(), &summaries);
        let available = !found_files.is_empty() && !found_summaries.is_empty();
        info!(available, base_name=%base, plots=found_files.len(), summaries=found_summaries.len(), "ml.availability_checked");

        self.cache.insert_ml(filename, MlAvailabilityRecord { available, base_name: base, checked_paths, found_files, found_summaries })
    }

    /// Signed plot URL and summary text for each model, whichever exist right now.
    #[tracing::instrument(level="info", skip(self))]
    pub async fn page(&self, filename: &str) -> Result<MlPageRecord, ResultsError> {
        let base = base_name(filename);
        let results = self.storage.results();
        let mut page = MlPageRecord { filename: filename.to_string(), ..Default::default() };
        for model in MlModel::ALL {
            let plot = model.plot_key(&base);
            if results.exists(&plot).await.map_err(|e| ResultsError::StorageTransient(e.to_string()))? {
                page.model_mut(model).plot_url = Some(self.sign(&plot).await?);
            }
            let summary = model.summary_key(&base);
            if results.exists(&summary).await.map_err(|e| ResultsError::StorageTransient(e.to_string()))? {
                let text = results.read_text(&summary).await.map_err(|e| ResultsError::StorageTransient(e.to_string()))?;
                page.model_mut(model).summary = Some(text);
            }
        }
        self.cache.merge_ml_page(filename, page.clone());
        Ok(page)
    }

    /// Signed URL of one model summary, selected by its short code (`lr`, `dt`, `rf`).
    pub async fn summary_download_url(&self, filename: &str, summary_type: &str) -> Result<Option<String>, ResultsError> {
        let Some(model) = MlModel::from_summary_code(summary_type) else { return Ok(None) };
        self.sign(&model.summary_key(&base_name(filename))).await.map(Some)
    }

    async fn sign(&self, key: &str) -> Result<String, ResultsError> {
        self.storage.sign_result(key, self.signed_url_ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const BASE: &str = "https://storage.example";

    fn inspector() -> (Arc<MemoryStore>, Arc<AvailabilityCache>, MlInspector) {
        let results = Arc::new(MemoryStore::new("outputs", BASE));
        let storage = StorageManager::new(Arc::new(MemoryStore::new("uploads", BASE)), results.clone(), BASE);
        let cache = Arc::new(AvailabilityCache::default());
        let ml = MlInspector::new(storage, cache.clone(), PollProfile::ML_BATCH, Duration::from_secs(14400));
        (results, cache, ml)
    }

    #[tokio::test(start_paused = true)]
    async fn partial_artifacts_count_as_available() {
        let (results, _, ml) = inspector();
        results.insert("ML_predictions/linear_regression_X.png", "png");
        results.insert("chatgpt_api/lr_summary_X.txt", "lr text");
        let started = tokio::time::Instant::now();
        let rec = ml.check_availability("X").await;
        assert!(rec.available);
        assert_eq!(rec.base_name, "X");
        assert_eq!(rec.found_files, vec!["ML_predictions/linear_regression_X.png"]);
        assert_eq!(rec.found_summaries, vec!["chatgpt_api/lr_summary_X.txt"]);
        assert_eq!(rec.checked_paths.len(), 6);
        assert_eq!(started.elapsed(), Duration::from_secs(35));
    }

    #[tokio::test(start_paused = true)]
    async fn plots_without_summaries_are_unavailable_and_cached() {
        let (results, cache, ml) = inspector();
        results.insert("ML_predictions/decision_tree_u_d.csv.png", "png");
        let rec = ml.check_availability("cleaned_u_d.csv").await;
        assert!(!rec.available);
        assert_eq!(rec.base_name, "u_d.csv");
        assert!(rec.found_summaries.is_empty());
        let cached = cache.ml("cleaned_u_d.csv").unwrap();
        assert!(Arc::ptr_eq(&rec, &cached));
        assert!(cache.ml("u_d.csv").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_early_when_everything_exists() {
        let (results, _, ml) = inspector();
        for m in MlModel::ALL {
            results.insert(&m.plot_key("r.csv"), "png");
            results.insert(&m.summary_key("r.csv"), "txt");
        }
        let started = tokio::time::Instant::now();
        let rec = ml.check_availability("r.csv").await;
        assert!(rec.available);
        assert_eq!(rec.found_files.len(), 3);
        assert_eq!(started.elapsed(), Duration::ZERO);
        // second call is served from cache without polling
        let again = ml.check_availability("r.csv").await;
        assert!(Arc::ptr_eq(&rec, &again));
    }

    #[tokio::test(start_paused = true)]
    async fn found_paths_are_listed_in_discovery_order() {
        let (results, _, ml) = inspector();
        results.insert("ML_predictions/feature_importance_late.png", "png");
        results.insert("chatgpt_api/rf_summary_late.txt", "rf");
        let writer = {
            let results = results.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                results.insert("ML_predictions/linear_regression_late.png", "png");
                results.insert("chatgpt_api/dt_summary_late.txt", "dt");
                results.insert("chatgpt_api/lr_summary_late.txt", "lr");
            })
        };
        let rec = ml.check_availability("late.xlsx").await;
        writer.await.unwrap();
        assert_eq!(rec.found_files, vec!["ML_predictions/feature_importance_late.png", "ML_predictions/linear_regression_late.png"]);
        assert_eq!(rec.found_summaries, vec!["chatgpt_api/rf_summary_late.txt", "chatgpt_api/lr_summary_late.txt", "chatgpt_api/dt_summary_late.txt"]);
    }

    #[tokio::test]
    async fn page_reports_each_model_independently() {
        let (results, cache, ml) = inspector();
        results.insert("ML_predictions/feature_importance_sales.png", "png");
        results.insert("chatgpt_api/dt_summary_sales.txt", "tree says hi");
        let page = ml.page("cleaned_sales.xlsx").await.unwrap();
        assert!(page.feature_importance.plot_url.as_deref().unwrap().contains("feature_importance_sales.png"));
        assert_eq!(page.feature_importance.summary, None);
        assert_eq!(page.decision_tree.summary.as_deref(), Some("tree says hi"));
        assert_eq!(page.linear_regression, Default::default());
        assert_eq!(cache.result("cleaned_sales.xlsx").unwrap().ml.as_ref(), Some(&page));
    }

    #[tokio::test]
    async fn summary_download_by_code() {
        let (_, _, ml) = inspector();
        let url = ml.summary_download_url("cleaned_a.txt", "rf").await.unwrap().unwrap();
        assert!(url.contains("chatgpt_api/rf_summary_a.txt"), "{url}");
        assert!(url.contains("filename%3D%22rf_summary_a.txt%22"), "{url}");
        assert_eq!(ml.summary_download_url("a.csv", "svm").await.unwrap(), None);
    }
}
