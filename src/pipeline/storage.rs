//! Object storage: path resolution plus the Supabase Storage adapter.
//!
//! Proformas are referenced by their *public* URL, but downloads go through
//! the authenticated object API, which wants a bucket-relative path.
//! [`resolve_storage_path`] bridges the two. The [`ObjectStore`] trait is the
//! seam the pipeline talks to; [`SupabaseStorage`] is the production
//! implementation over the Storage REST API.

use crate::config::required_env;
use crate::error::PurchaseOrderError;
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Map a public object URL to a bucket-relative path starting with `/`.
///
/// The path is whatever follows `/storage/v1/object/public/{bucket}/`; for
/// URLs without that marker, the last path segment.
pub fn resolve_storage_path(url: &str, bucket: &str) -> Result<String, PurchaseOrderError> {
    let invalid = || PurchaseOrderError::InvalidReference {
        url: url.to_string(),
    };

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let decoded = percent_decode_str(parsed.path()).decode_utf8_lossy();

    let marker = format!("/storage/v1/object/public/{bucket}/");
    let relative = match decoded.split_once(marker.as_str()) {
        Some((_, rest)) => rest,
        None => decoded.rsplit('/').next().unwrap_or_default(),
    };

    if relative.is_empty() {
        return Err(invalid());
    }

    if relative.starts_with('/') {
        Ok(relative.to_string())
    } else {
        Ok(format!("/{relative}"))
    }
}

/// What the store reports back after an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Bucket-relative path of the stored object.
    pub path: String,
}

/// Byte-level access to an object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, PurchaseOrderError>;

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<UploadReceipt, PurchaseOrderError>;

    /// Public URL for an object. Pure; no network round trip.
    fn public_url(&self, bucket: &str, path: &str) -> Result<String, PurchaseOrderError>;
}

/// Connection settings for [`SupabaseStorage`].
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Service or anon key.
    pub key: String,
    /// HTTP timeout per request in seconds. Default: 120.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            timeout_secs: 120,
        }
    }

    /// Read `SUPABASE_URL` and `SUPABASE_KEY`.
    pub fn from_env() -> Result<Self, PurchaseOrderError> {
        Ok(Self::new(required_env("SUPABASE_URL")?, required_env("SUPABASE_KEY")?))
    }
}

/// [`ObjectStore`] over the Supabase Storage REST API.
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: Url,
    key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponseBody {
    #[serde(rename = "Key")]
    key: Option<String>,
}

impl SupabaseStorage {
    pub fn new(config: &SupabaseConfig) -> Result<Self, PurchaseOrderError> {
        let base_url = Url::parse(&config.url).map_err(|e| {
            PurchaseOrderError::InvalidConfig(format!("Invalid Supabase URL '{}': {e}", config.url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PurchaseOrderError::InvalidConfig(format!(
                "Supabase URL '{}' cannot carry a path",
                config.url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PurchaseOrderError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            key: config.key.clone(),
        })
    }

    /// `{base}/storage/v1/object/{prefix..}/{bucket}/{path}` with every
    /// segment percent-encoded.
    fn object_url(&self, prefix: &[&str], bucket: &str, path: &str) -> Result<Url, PurchaseOrderError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                PurchaseOrderError::InvalidConfig(format!(
                    "Supabase URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?;
            segments
                .pop_if_empty()
                .extend(["storage", "v1", "object"])
                .extend(prefix)
                .push(bucket)
                .extend(path.trim_start_matches('/').split('/'));
        }
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.key).header("apikey", &self.key)
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, PurchaseOrderError> {
        let url = self.object_url(&[], bucket, path)?;
        info!("Downloading {}/{}", bucket, path);

        let fail = |reason: String| PurchaseOrderError::storage("download", bucket, path, reason);

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<UploadReceipt, PurchaseOrderError> {
        let url = self.object_url(&[], bucket, path)?;
        info!("Uploading {} bytes to {}/{} (upsert={})", data.len(), bucket, path, upsert);

        let fail = |reason: String| PurchaseOrderError::storage("upload", bucket, path, reason);

        let response = self
            .authorize(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(data)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {status}: {body}")));
        }

        let body: UploadResponseBody = response
            .json()
            .await
            .map_err(|e| fail(format!("unreadable upload response: {e}")))?;

        let path = body
            .key
            .as_deref()
            .map(|key| key.strip_prefix(&format!("{bucket}/")).unwrap_or(key))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| fail("upload response missing file path".to_string()))?;

        Ok(UploadReceipt {
            path: path.to_string(),
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> Result<String, PurchaseOrderError> {
        Ok(self.object_url(&["public"], bucket, path)?.to_string())
    }
}
