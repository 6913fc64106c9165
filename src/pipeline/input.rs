//! Input resolution: turn a user-supplied path, URL or `gs://` URI into a
//! [`RawDocument`].
//!
//! pdfium opens documents from memory, so every source is read fully into a
//! byte buffer; no temp files are involved. The `%PDF` magic is checked here
//! so a wrong file fails with a clear [`ResumeError::Decode`] before any
//! rendering work is scheduled.

use crate::document::RawDocument;
use crate::error::{ResumeError, StorageOp};
use crate::storage::ObjectStore;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Where a document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Local(PathBuf),
    Url(String),
    Object { bucket: String, key: String },
}

impl DocumentSource {
    /// Classify an input string. `gs://bucket/key` needs both parts.
    pub fn parse(input: &str) -> Result<Self, ResumeError> {
        if is_url(input) {
            return Ok(Self::Url(input.to_string()));
        }
        if let Some(rest) = input.strip_prefix("gs://") {
            return match rest.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Self::Object {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }),
                _ => Err(ResumeError::Validation(format!(
                    "'{input}' is not a gs://bucket/object URI"
                ))),
            };
        }
        if input.trim().is_empty() {
            return Err(ResumeError::Validation("input path is empty".into()));
        }
        Ok(Self::Local(PathBuf::from(input)))
    }
}

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to document bytes.
///
/// `store` is only consulted for `gs://` inputs; passing `None` for one is a
/// [`ResumeError::InvalidConfig`].
pub async fn resolve_input(
    input: &str,
    store: Option<&dyn ObjectStore>,
    timeout_secs: u64,
) -> Result<RawDocument, ResumeError> {
    let document = match DocumentSource::parse(input)? {
        DocumentSource::Local(path) => read_local(path).await?,
        DocumentSource::Url(url) => download_url(&url, timeout_secs).await?,
        DocumentSource::Object { bucket, key } => {
            let store = store.ok_or_else(|| {
                ResumeError::InvalidConfig(format!(
                    "'{input}' needs object storage, but none is configured"
                ))
            })?;
            RawDocument::new(store.download(&bucket, &key).await?)
        }
    };

    ensure_pdf(&document)?;
    debug!("Resolved {} ({} bytes)", input, document.len());
    Ok(document)
}

/// Reject bytes without the `%PDF` signature.
pub fn ensure_pdf(document: &RawDocument) -> Result<(), ResumeError> {
    if document.looks_like_pdf() {
        Ok(())
    } else {
        Err(ResumeError::Decode {
            detail: format!(
                "not a PDF (magic bytes {:02x?}, {} bytes)",
                document.magic(),
                document.len()
            ),
        })
    }
}

async fn read_local(path: PathBuf) -> Result<RawDocument, ResumeError> {
    let key = path.display().to_string();
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        let detail = match e.kind() {
            std::io::ErrorKind::NotFound => "file not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
            _ => e.to_string(),
        };
        ResumeError::storage(StorageOp::Download, "local", &key, detail)
    })?;
    Ok(RawDocument::new(bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<RawDocument, ResumeError> {
    info!("Downloading PDF from: {}", url);
    let fail = |detail: String| ResumeError::storage(StorageOp::Download, "http", url, detail);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            fail(format!("timed out after {timeout_secs}s"))
        } else {
            fail(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(RawDocument::new(bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalObjectStore;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("gs://bucket/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn parse_sources() {
        assert_eq!(
            DocumentSource::parse("gs://cvs/2024/jane.pdf").unwrap(),
            DocumentSource::Object {
                bucket: "cvs".into(),
                key: "2024/jane.pdf".into()
            }
        );
        assert_eq!(
            DocumentSource::parse("cv.pdf").unwrap(),
            DocumentSource::Local(PathBuf::from("cv.pdf"))
        );
        assert!(DocumentSource::parse("gs://cvs").is_err());
        assert!(DocumentSource::parse("gs:///x.pdf").is_err());
        assert!(DocumentSource::parse("  ").is_err());
    }

    #[tokio::test]
    async fn local_pdf_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%%EOF").unwrap();
        let doc = resolve_input(path.to_str().unwrap(), None, 5).await.unwrap();
        assert_eq!(doc.len(), 14);
    }

    #[tokio::test]
    async fn local_non_pdf_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.pdf");
        std::fs::write(&path, b"<html>").unwrap();
        let err = resolve_input(path.to_str().unwrap(), None, 5).await.unwrap_err();
        assert!(matches!(err, ResumeError::Decode { .. }));
    }

    #[tokio::test]
    async fn missing_local_file_is_a_retrieve_error() {
        let err = resolve_input("/nonexistent/cv.pdf", None, 5).await.unwrap_err();
        assert_eq!(err.stage(), crate::Stage::Retrieve);
    }

    #[tokio::test]
    async fn object_uri_uses_the_store() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("cvs")).unwrap();
        std::fs::write(root.path().join("cvs").join("jane.pdf"), b"%PDF-1.7").unwrap();
        let store = LocalObjectStore::new(root.path());

        let doc = resolve_input("gs://cvs/jane.pdf", Some(&store), 5).await.unwrap();
        assert!(doc.looks_like_pdf());

        let err = resolve_input("gs://cvs/jane.pdf", None, 5).await.unwrap_err();
        assert!(matches!(err, ResumeError::InvalidConfig(_)));
    }
}
