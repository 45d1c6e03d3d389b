use async_trait::async_trait;
use std::{collections::HashMap, sync::{Arc, Mutex}, time::Duration};
use tracing::info;

use crate::config::{StorageMode, StorageSettings};
use crate::error::ResultsError;

/// One bucket of the object store the pipeline reads from and writes to.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    fn bucket(&self) -> &str;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()>;
    /// Fresh existence check; implementations must not answer from cached metadata.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
    async fn read_text(&self, key: &str) -> anyhow::Result<String>;
    /// Time-limited GET URL that makes browsers save the object as `download_as`.
    async fn signed_url(&self, key: &str, ttl: Duration, download_as: &str) -> anyhow::Result<String>;
}

/// Final path segment of a key, used as the forced download filename.
pub fn download_name(key: &str) -> &str { key.rsplit('/').next().unwrap_or(key) }

/// In-process bucket. Backs the default "mock" mode and the test suites.
#[derive(Debug, Default)]
pub struct MemoryStore { bucket: String, base_url: String, objects: Mutex<HashMap<String, Vec<u8>>> }

impl MemoryStore {
    pub fn new(bucket: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), base_url: base_url.into(), objects: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap_or_else(|p| p.into_inner()).insert(key.to_string(), bytes.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap_or_else(|p| p.into_inner()).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap_or_else(|p| p.into_inner()).keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str { &self.bucket }
    async fn put(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> { self.insert(key, bytes); Ok(()) }
    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap_or_else(|p| p.into_inner()).contains_key(key))
    }
    async fn read_text(&self, key: &str) -> anyhow::Result<String> {
        let bytes = self.get(key).ok_or_else(|| anyhow::anyhow!("object not found: {key}"))?;
        Ok(String::from_utf8(bytes)?)
    }
    async fn signed_url(&self, key: &str, ttl: Duration, download_as: &str) -> anyhow::Result<String> {
        let mut url = url::Url::parse(&format!("{}/{}/", self.base_url.trim_end_matches('/'), self.bucket))?;
        url = url.join(&key.replace(' ', "%20"))?;
        url.query_pairs_mut()
            .append_pair("X-Expires", &ttl.as_secs().to_string())
            .append_pair("response-content-disposition", &format!("attachment; filename=\"{download_as}\""));
        Ok(url.to_string())
    }
}

#[cfg(feature="s3")]
#[derive(Clone)]
pub struct S3ObjectStore { client: aws_sdk_s3::Client, bucket: String }

#[cfg(feature="s3")]
impl std::fmt::Debug for S3ObjectStore { fn fmt(&self, f:&mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.debug_struct("S3ObjectStore").field("bucket", &self.bucket).finish() } }

#[cfg(feature="s3")]
#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str { &self.bucket }
    async fn put(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        use aws_sdk_s3::primitives::ByteStream;
        self.client.put_object().bucket(&self.bucket).key(key).body(ByteStream::from(bytes)).send().await?;
        Ok(())
    }
    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) { return Ok(false); }
                Err(e.into())
            }
        }
    }
    async fn read_text(&self, key: &str) -> anyhow::Result<String> {
        let obj = self.client.get_object().bucket(&self.bucket).key(key).send().await?;
        let bytes = obj.body.collect().await?.into_bytes();
        Ok(String::from_utf8(bytes.to_vec())?)
    }
    async fn signed_url(&self, key: &str, ttl: Duration, download_as: &str) -> anyhow::Result<String> {
        use aws_sdk_s3::presigning::PresigningConfig;
        // SigV4 presigned URLs are capped at 7 days
        let expires = std::cmp::min(ttl.as_secs(), 7 * 24 * 3600);
        let config = PresigningConfig::builder().expires_in(Duration::from_secs(expires)).build()?;
        let presigned = self.client.get_object().bucket(&self.bucket).key(key)
            .response_content_disposition(format!("attachment; filename=\"{download_as}\""))
            .presigned(config).await?;
        Ok(presigned.uri().to_string())
    }
}

/// Upload and results areas, plus the public URL shape of the results bucket.
#[derive(Clone)]
pub struct StorageManager { uploads: Arc<dyn ObjectStore>, results: Arc<dyn ObjectStore>, public_base_url: String }

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f:&mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager").field("uploads", &self.uploads.bucket()).field("results", &self.results.bucket()).finish()
    }
}

impl StorageManager {
    pub fn new(uploads: Arc<dyn ObjectStore>, results: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self { uploads, results, public_base_url: public_base_url.into() }
    }

    pub async fn from_settings(settings: &StorageSettings) -> Self {
        if settings.mode == StorageMode::S3 {
            #[cfg(feature="s3")]
            {
                if let Some(path) = &settings.credentials_path { std::env::set_var("AWS_SHARED_CREDENTIALS_FILE", path); }
                let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(aws_sdk_s3::config::Region::new(settings.region.clone())).load().await;
                let mut builder = aws_sdk_s3::config::Builder::from(&shared);
                if let Some(ep) = &settings.endpoint_url {
                    builder = builder.endpoint_url(ep).force_path_style(true);
                }
                let client = aws_sdk_s3::Client::from_conf(builder.build());
                info!(uploads=%settings.upload_bucket, results=%settings.results_bucket, "storage_manager.init_s3");
                return Self::new(
                    Arc::new(S3ObjectStore { client: client.clone(), bucket: settings.upload_bucket.clone() }),
                    Arc::new(S3ObjectStore { client, bucket: settings.results_bucket.clone() }),
                    settings.public_base_url.clone(),
                );
            }
            #[cfg(not(feature="s3"))]
            tracing::warn!("s3 feature not enabled, falling back to in-memory store");
        }
        info!(uploads=%settings.upload_bucket, results=%settings.results_bucket, "storage_manager.init_memory");
        Self::new(
            Arc::new(MemoryStore::new(&settings.upload_bucket, &settings.public_base_url)),
            Arc::new(MemoryStore::new(&settings.results_bucket, &settings.public_base_url)),
            settings.public_base_url.clone(),
        )
    }

    pub fn uploads(&self) -> &dyn ObjectStore { self.uploads.as_ref() }
    pub fn results(&self) -> &dyn ObjectStore { self.results.as_ref() }

    /// `{public_base_url}/{results_bucket}/`, the prefix every pipeline-published URL starts with.
    pub fn results_public_prefix(&self) -> String {
        format!("{}/{}/", self.public_base_url.trim_end_matches('/'), self.results.bucket())
    }

    pub fn results_public_url(&self, key: &str) -> String { format!("{}{key}", self.results_public_prefix()) }

    /// Signed download URL for a results-area key, saved under the key's last segment.
    pub async fn sign_result(&self, key: &str, ttl: Duration) -> Result<String, ResultsError> {
        self.results.signed_url(key, ttl, download_name(key)).await
            .map_err(|e| ResultsError::Signing(format!("{key}: {e}")))
    }
}
