//! Process-wide availability cache.
//!
//! Holds assembled [`ResultRecord`]s and ML availability records, keyed by
//! filename. A result is inserted under the raw filename and, when it
//! differs, the `cleaned_` alias; both keys share one `Arc` so they stay
//! pointer-equal until the entry is replaced or evicted. Built once at start
//! and handed to the handlers through `AppState`.

use std::{collections::{BTreeMap, HashMap}, sync::{Arc, Mutex, MutexGuard}, time::Duration};
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheSettings;
use crate::models::{MlAvailabilityRecord, MlPageRecord, ResultRecord};
use crate::telemetry::CACHE_LOOKUPS;

struct Entry<T> { value: Arc<T>, inserted_at: Instant }

struct Shelf<T> { entries: HashMap<String, Entry<T>> }

impl<T> Shelf<T> {
    fn new() -> Self { Self { entries: HashMap::new() } }

    fn get(&mut self, key: &str, ttl: Option<Duration>) -> Option<Arc<T>> {
        let expired = match (self.entries.get(key), ttl) {
            (None, _) => return None,
            (Some(e), Some(ttl)) => e.inserted_at.elapsed() > ttl,
            (Some(_), None) => false,
        };
        if expired {
            self.entries.remove(key);
            debug!(key, "cache.expired");
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn insert(&mut self, key: &str, value: Arc<T>, max_entries: Option<usize>) {
        self.entries.insert(key.to_string(), Entry { value, inserted_at: Instant::now() });
        let Some(max) = max_entries else { return };
        while self.entries.len() > max {
            let Some(oldest) = self.entries.iter().min_by_key(|(_, e)| e.inserted_at).map(|(k, _)| k.clone()) else { break };
            self.entries.remove(&oldest);
            debug!(key=%oldest, "cache.evicted");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(|p| p.into_inner()) }

pub struct AvailabilityCache {
    results: Mutex<Shelf<ResultRecord>>,
    ml: Mutex<Shelf<MlAvailabilityRecord>>,
    max_entries: Option<usize>,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for AvailabilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityCache").field("max_entries", &self.max_entries).field("ttl", &self.ttl).finish()
    }
}

impl Default for AvailabilityCache {
    fn default() -> Self { Self::new(CacheSettings::default()) }
}

impl AvailabilityCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            results: Mutex::new(Shelf::new()),
            ml: Mutex::new(Shelf::new()),
            max_entries: settings.max_entries,
            ttl: settings.ttl_secs.map(Duration::from_secs),
        }
    }

    /// Any cached record for `key`, complete or not.
    pub fn result(&self, key: &str) -> Option<Arc<ResultRecord>> { lock(&self.results).get(key, self.ttl) }

    /// Cached record for `key` only if it carries both the cleaned CSV and the summary.
    pub fn complete_result(&self, key: &str) -> Option<Arc<ResultRecord>> {
        let hit = self.result(key).filter(|r| r.is_complete());
        CACHE_LOOKUPS.with_label_values(&["results", if hit.is_some() { "hit" } else { "miss" }]).inc();
        hit
    }

    /// Store `record` under `filename` and under `cleaned` when that differs.
    pub fn insert_result(&self, filename: &str, cleaned: &str, record: ResultRecord) -> Arc<ResultRecord> {
        let record = Arc::new(record);
        let mut shelf = lock(&self.results);
        shelf.insert(filename, record.clone(), self.max_entries);
        if filename != cleaned { shelf.insert(cleaned, record.clone(), self.max_entries); }
        record
    }

    /// Attach an ML page to the entry for `filename`, creating one if needed.
    ///
    /// The entry is looked up under its recorded `original_filename` first.
    /// Every key that pointed at the old record is moved to the new one.
    pub fn merge_ml_page(&self, filename: &str, page: MlPageRecord) -> Arc<ResultRecord> {
        let mut shelf = lock(&self.results);
        let cache_key = shelf.get(filename, self.ttl).map(|r| r.original_filename.clone()).unwrap_or_else(|| filename.to_string());
        let previous = shelf.get(&cache_key, self.ttl);
        let mut next = previous.as_deref().cloned().unwrap_or_else(|| ResultRecord { original_filename: filename.to_string(), ..Default::default() });
        next.ml = Some(page);
        let next = Arc::new(next);
        if let Some(prev) = &previous {
            let aliases: Vec<String> = shelf.entries.iter().filter(|(_, e)| Arc::ptr_eq(&e.value, prev)).map(|(k, _)| k.clone()).collect();
            for key in aliases { shelf.insert(&key, next.clone(), self.max_entries); }
        }
        shelf.insert(&cache_key, next.clone(), self.max_entries);
        next
    }

    /// Drop every result entry. ML availability entries are kept.
    pub fn clear(&self) {
        let mut shelf = lock(&self.results);
        debug!(entries=shelf.entries.len(), "cache.cleared");
        shelf.entries.clear();
    }

    /// Cache keys with the populated field names of their records.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<&'static str>> {
        lock(&self.results).entries.iter().map(|(k, e)| (k.clone(), e.value.field_names())).collect()
    }

    pub fn ml(&self, key: &str) -> Option<Arc<MlAvailabilityRecord>> {
        let hit = lock(&self.ml).get(key, self.ttl);
        CACHE_LOOKUPS.with_label_values(&["ml", if hit.is_some() { "hit" } else { "miss" }]).inc();
        hit
    }

    pub fn insert_ml(&self, key: &str, record: MlAvailabilityRecord) -> Arc<MlAvailabilityRecord> {
        let record = Arc::new(record);
        lock(&self.ml).insert(key, record.clone(), self.max_entries);
        record
    }
}
