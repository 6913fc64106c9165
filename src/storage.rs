//! Object storage: where résumés come from and where reports go.
//!
//! [`ObjectStore`] is the seam. [`GcsObjectStore`] speaks the Google Cloud
//! Storage JSON API over `reqwest` with credentials handed in at
//! construction; [`LocalObjectStore`] maps buckets to sub-directories of a
//! root, for local runs and tests.

use crate::config::StorageConfig;
use crate::error::{ResumeError, StorageOp};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Characters left alone when encoding an object name into a URL: the RFC 3986
/// unreserved set.
const OBJECT_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Retrieval and upload of whole objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the object's bytes.
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ResumeError>;

    /// Upload a local file and return the object's public URL.
    async fn upload(&self, bucket: &str, key: &str, local_path: &Path)
        -> Result<String, ResumeError>;

    /// Public URL of an object, whether or not it exists.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

// ── Google Cloud Storage ─────────────────────────────────────────────────

/// [`ObjectStore`] backed by the Cloud Storage JSON API.
pub struct GcsObjectStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl GcsObjectStore {
    pub fn new(config: StorageConfig) -> Result<Self, ResumeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ResumeError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn download_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.config.api_base.trim_end_matches('/'),
            utf8_percent_encode(bucket, OBJECT_NAME),
            utf8_percent_encode(key, OBJECT_NAME)
        )
    }

    fn upload_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.config.api_base.trim_end_matches('/'),
            utf8_percent_encode(bucket, OBJECT_NAME),
            utf8_percent_encode(key, OBJECT_NAME)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.credentials.access_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ResumeError> {
        let fail = |detail: String| ResumeError::storage(StorageOp::Download, bucket, key, detail);
        info!("Downloading gs://{}/{}", bucket, key);

        let response = self
            .authorize(self.client.get(self.download_url(bucket, key)))
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = match status.as_u16() {
                404 => "object not found".to_string(),
                401 | 403 => format!("access denied (HTTP {status})"),
                _ => format!("HTTP {status}"),
            };
            return Err(fail(detail));
        }

        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<String, ResumeError> {
        let fail = |detail: String| ResumeError::storage(StorageOp::Upload, bucket, key, detail);

        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| fail(format!("cannot read {}: {e}", local_path.display())))?;
        info!("Uploading {} bytes to gs://{}/{}", body.len(), bucket, key);

        let response = self
            .authorize(self.client.post(self.upload_url(bucket, key)))
            .header(reqwest::header::CONTENT_TYPE, content_type_for(key))
            .body(body)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {status}: {}", text.trim())));
        }

        Ok(self.public_url(bucket, key))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_base.trim_end_matches('/'),
            bucket,
            key
        )
    }
}

fn content_type_for(key: &str) -> &'static str {
    if key.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

// ── Local directory ──────────────────────────────────────────────────────

/// [`ObjectStore`] over a local directory: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object path, refusing keys that climb out of the bucket.
    fn object_path(&self, bucket: &str, key: &str) -> Option<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        (safe && !bucket.is_empty() && !key.is_empty()).then(|| self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ResumeError> {
        let fail = |detail: String| ResumeError::storage(StorageOp::Download, bucket, key, detail);
        let path = self
            .object_path(bucket, key)
            .ok_or_else(|| fail("invalid object name".to_string()))?;

        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                fail("object not found".to_string())
            } else {
                fail(e.to_string())
            }
        })
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<String, ResumeError> {
        let fail = |detail: String| ResumeError::storage(StorageOp::Upload, bucket, key, detail);
        let path = self
            .object_path(bucket, key)
            .ok_or_else(|| fail("invalid object name".to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fail(e.to_string()))?;
        }
        tokio::fs::copy(local_path, &path)
            .await
            .map_err(|e| fail(format!("cannot copy {}: {e}", local_path.display())))?;

        debug!("Stored {}", path.display());
        Ok(self.public_url(bucket, key))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("file://{}", self.root.join(bucket).join(key).display())
    }
}
