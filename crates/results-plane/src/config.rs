use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}, time::Duration};
use tracing::debug;

use crate::poller::PollProfile;

pub const CONFIG_PATH_ENV: &str = "RESULTS_PLANE_CONFIG";
const ENV_PREFIX: &str = "RESULTS_PLANE_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat { #[default] Compact, Json }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode { #[default] Mock, S3 }

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub mode: StorageMode,
    pub upload_bucket: String,
    pub results_bucket: String,
    /// Scheme and host that prefix public object URLs (`{base}/{bucket}/{key}`).
    pub public_base_url: String,
    pub endpoint_url: Option<String>,
    pub region: String,
    pub credentials_path: Option<PathBuf>,
    pub signed_url_ttl_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            mode: StorageMode::Mock,
            upload_bucket: "uploadscsv".into(),
            results_bucket: "outputscsv".into(),
            public_base_url: "https://storage.googleapis.com".into(),
            endpoint_url: None,
            region: "us-east-1".into(),
            credentials_path: None,
            signed_url_ttl_secs: 4 * 3600,
        }
    }
}

impl StorageSettings {
    pub fn signed_url_ttl(&self) -> Duration { Duration::from_secs(self.signed_url_ttl_secs) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub cleaned_csv: PollProfile,
    pub metadata: PollProfile,
    pub visualization_summary: PollProfile,
    pub ml_batch: PollProfile,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            cleaned_csv: PollProfile::CLEANED_CSV,
            metadata: PollProfile::METADATA,
            visualization_summary: PollProfile::VISUALIZATION_SUMMARY,
            ml_batch: PollProfile::ML_BATCH,
        }
    }
}

/// Cache bounds; both `None` keeps every entry until the cache is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: Option<usize>,
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub max_upload_bytes: usize,
    pub storage: StorageSettings,
    pub poll: PollSettings,
    pub cache: CacheSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".into(),
            log_level: "info".into(),
            log_format: LogFormat::Compact,
            max_upload_bytes: 64 * 1024 * 1024,
            storage: StorageSettings::default(),
            poll: PollSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Settings {
    /// File (if present) then `RESULTS_PLANE_*` env overrides.
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        let mut settings = Self::from_file(&path)?;
        settings.apply_env(|k| std::env::var(k).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path=?path, exists=path.exists(), "config.load.attempt");
        if !path.exists() { return Ok(Self::default()); }
        let content = fs::read_to_string(path).with_context(|| format!("read config {path:?}"))?;
        let parsed: Self = toml::from_str(&content).with_context(|| format!("parse config {path:?}"))?;
        debug!("config.parse.success");
        Ok(parsed)
    }

    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| get(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());
        if let Some(v) = var("LISTEN_ADDR") { self.listen_addr = v; }
        if let Some(v) = var("LOG_LEVEL") { self.log_level = v; }
        if let Some(v) = var("LOG_FORMAT") {
            self.log_format = match v.to_ascii_lowercase().as_str() { "json" => LogFormat::Json, _ => LogFormat::Compact };
        }
        if let Some(v) = var("MAX_UPLOAD_BYTES") { self.max_upload_bytes = v.parse().context("RESULTS_PLANE_MAX_UPLOAD_BYTES")?; }
        if let Some(v) = var("STORAGE_MODE") {
            self.storage.mode = if v.eq_ignore_ascii_case("s3") { StorageMode::S3 } else { StorageMode::Mock };
        }
        if let Some(v) = var("UPLOAD_BUCKET") { self.storage.upload_bucket = v; }
        if let Some(v) = var("RESULTS_BUCKET") { self.storage.results_bucket = v; }
        if let Some(v) = var("PUBLIC_BASE_URL") { self.storage.public_base_url = v; }
        if let Some(v) = var("S3_ENDPOINT_URL") { self.storage.endpoint_url = Some(v); }
        if let Some(v) = var("REGION") { self.storage.region = v; }
        if let Some(v) = var("CREDENTIALS_PATH") { self.storage.credentials_path = Some(PathBuf::from(v)); }
        if let Some(v) = var("SIGNED_URL_TTL_SECS") { self.storage.signed_url_ttl_secs = v.parse().context("RESULTS_PLANE_SIGNED_URL_TTL_SECS")?; }
        if let Some(v) = var("CACHE_MAX_ENTRIES") { self.cache.max_entries = Some(v.parse().context("RESULTS_PLANE_CACHE_MAX_ENTRIES")?); }
        if let Some(v) = var("CACHE_TTL_SECS") { self.cache.ttl_secs = Some(v.parse().context("RESULTS_PLANE_CACHE_TTL_SECS")?); }
        Ok(())
    }
}

pub fn config_file_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("results-plane.toml"))
}
