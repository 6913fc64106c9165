//! # resume-digest
//!
//! Turn scanned résumé PDFs into structured candidate records and a
//! "CV Summary" PDF report.
//!
//! ## Why this crate?
//!
//! Résumés arrive as scans and image-only PDFs, so text extraction has to go
//! through OCR, and OCR output is noisy: bullets read as `e`, `S1` as `$1`,
//! e-mail dots lost, phone numbers split across dashes. A fixed table of
//! rewrite rules repairs the common damage before a single LLM call maps the
//! text onto a fixed schema. The rules are deterministic and idempotent, so
//! the text the model sees is reproducible from the document alone.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Retrieve      local file, URL, or object storage
//!  ├─ 2. OCR           pdfium rasterisation + tesseract, page by page
//!  ├─ 3. Canonicalize  12 ordered rewrite rules, to a fixed point
//!  ├─ 4. Extract       one completion call, JSON span → validated record
//!  └─ 5. Report        (summarize flow) render PDF, upload, return URL
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_digest::{digest, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::default();
//!     let pipeline = Pipeline::from_config(&config)?;
//!     let output = digest(&pipeline, "cv.pdf", None, &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.record)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume-digest` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## External tools
//!
//! OCR shells out to `tesseract`; rasterisation and report rendering bind to
//! a pdfium shared library at run time. Neither is needed for
//! [`canonicalize`] or for pipelines assembled from custom collaborators.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod schema;
pub mod storage;
pub mod summarize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, StorageConfig, StorageCredentials};
pub use digest::{digest, Pipeline};
pub use document::{CanonicalText, PageImage, RawDocument, RawText};
pub use error::{ResumeError, Stage, StorageOp};
pub use output::{DigestOutput, DigestStats};
pub use pipeline::canonicalize::canonicalize;
pub use pipeline::extract::{extract_payload_span, SchemaExtractor};
pub use pipeline::input::resolve_input;
pub use pipeline::llm::{Completion, CompletionClient, CompletionRequest, LlmCompletionClient};
pub use pipeline::ocr::{OcrAdapter, Rasterizer, TesseractRecognizer, TextExtractor, TextRecognizer};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use report::{PdfiumReportRenderer, ReportRenderer};
pub use schema::{SchemaTemplate, StructuredRecord, UNKNOWN};
pub use storage::{GcsObjectStore, LocalObjectStore, ObjectStore};
pub use summarize::{report_name, SummaryRequest, SummaryResponse, Summarizer};
