//! Error types for the resume-digest library.
//!
//! Every failure is fatal to the current request: there is no partial record
//! and no retry inside the library. Each variant knows which pipeline
//! [`Stage`] produced it, so a caller can report provenance ("failed during
//! OCR") without re-running the request.
//!
//! [`ResumeError::MalformedResponse`] carries the raw completion text so the
//! prompt or model can be diagnosed from the error alone.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline step an error (or progress event) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Boundary validation of the incoming request.
    Request,
    /// Fetching the document bytes from storage, disk or HTTP.
    Retrieve,
    /// Rasterisation and text recognition.
    Ocr,
    /// Rule-based text canonicalisation.
    Canonicalize,
    /// LLM schema extraction.
    Extract,
    /// Summary report rendering.
    Render,
    /// Report upload.
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Request => "request",
            Stage::Retrieve => "retrieve",
            Stage::Ocr => "ocr",
            Stage::Canonicalize => "canonicalize",
            Stage::Extract => "extract",
            Stage::Render => "render",
            Stage::Upload => "upload",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which object-store operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageOp {
    Download,
    Upload,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageOp::Download => f.write_str("download"),
            StorageOp::Upload => f.write_str("upload"),
        }
    }
}

/// All errors returned by the resume-digest library.
#[derive(Debug, Error)]
pub enum ResumeError {
    // ── Input / OCR errors ───────────────────────────────────────────────
    /// The byte stream is not a valid paged document.
    #[error("Document could not be decoded: {detail}")]
    Decode { detail: String },

    /// The OCR capability was unreachable or failed on a page.
    #[error("Text recognition failed on page {page}: {detail}")]
    Recognition { page: usize, detail: String },

    // ── Extraction errors ────────────────────────────────────────────────
    /// The completion capability could not be reached or returned an error.
    #[error("Completion request failed: {detail}")]
    Extraction { detail: String },

    /// The completion text does not contain a record of the template's shape.
    #[error("Completion response is not a valid record: {detail}\nRaw response:\n{raw}")]
    MalformedResponse { detail: String, raw: String },

    // ── Collaborator errors ──────────────────────────────────────────────
    /// Object store retrieval or upload failed.
    #[error("Storage {op} failed for '{bucket}/{key}': {detail}")]
    Storage {
        op: StorageOp,
        bucket: String,
        key: String,
        detail: String,
    },

    /// The summary report could not be rendered or written.
    #[error("Report rendering failed: {detail}")]
    Render { detail: String },

    /// A required request field is missing or empty.
    #[error("Invalid request: {0}")]
    Validation(String),

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed, or no LLM provider could be resolved.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium or point --pdfium-lib / PDFIUM_LIB_PATH at the directory that contains it."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error (task panics, runtime creation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResumeError {
    /// The pipeline stage this error originated from.
    pub fn stage(&self) -> Stage {
        match self {
            ResumeError::Decode { .. }
            | ResumeError::Recognition { .. }
            | ResumeError::PdfiumBindingFailed(_) => Stage::Ocr,
            ResumeError::Extraction { .. } | ResumeError::MalformedResponse { .. } => {
                Stage::Extract
            }
            ResumeError::Storage { op: StorageOp::Download, .. } => Stage::Retrieve,
            ResumeError::Storage { op: StorageOp::Upload, .. } => Stage::Upload,
            ResumeError::Render { .. } => Stage::Render,
            ResumeError::Validation(_) | ResumeError::InvalidConfig(_) => Stage::Request,
            ResumeError::Internal(_) => Stage::Request,
        }
    }

    /// The unparsed completion text, when the failure was a malformed response.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ResumeError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    pub(crate) fn storage(
        op: StorageOp,
        bucket: &str,
        key: &str,
        detail: impl Into<String>,
    ) -> Self {
        ResumeError::Storage {
            op,
            bucket: bucket.to_string(),
            key: key.to_string(),
            detail: detail.into(),
        }
    }
}
