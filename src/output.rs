//! Output types returned by a pipeline run.

use crate::document::{CanonicalText, RawText};
use crate::schema::StructuredRecord;
use serde::Serialize;

/// Everything a detailed run produced.
#[derive(Debug, Clone)]
pub struct DigestOutput {
    /// OCR output, before any rule ran.
    pub raw_text: RawText,
    /// Text actually sent to the model.
    pub canonical_text: CanonicalText,
    /// The validated record.
    pub record: StructuredRecord,
    pub stats: DigestStats,
}

/// Timing and size figures for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DigestStats {
    pub raw_chars: usize,
    pub canonical_chars: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub ocr_duration_ms: u64,
    pub canonicalize_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}
