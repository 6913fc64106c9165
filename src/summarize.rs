//! Summarize request flow: a stored résumé in, a report URL and candidate
//! record out.
//!
//! ```text
//! SummaryRequest ─▶ validate ─▶ download ─▶ Pipeline ─▶ render report ─▶ upload ─▶ SummaryResponse
//! ```
//!
//! The request names the résumé by its storage path; only the last path
//! segment, percent-decoded, is used as the object name in the source
//! bucket. The report is written to a temp directory as
//! `<stem>_summary.pdf`, uploaded to the report bucket, and the temp file is
//! removed when the directory drops.

use crate::digest::{run_stage, Pipeline};
use crate::document::RawDocument;
use crate::error::{ResumeError, Stage};
use crate::report::ReportRenderer;
use crate::schema::StructuredRecord;
use crate::storage::ObjectStore;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Suffix appended to the résumé stem to name its report.
pub const REPORT_SUFFIX: &str = "_summary.pdf";

/// Incoming request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    #[serde(default)]
    pub original_cv_path: Option<String>,
    /// Echoed back untouched; string or number.
    #[serde(default)]
    pub cv_id: Option<Value>,
}

impl SummaryRequest {
    pub fn new(original_cv_path: impl Into<String>, cv_id: impl Into<Value>) -> Self {
        Self {
            original_cv_path: Some(original_cv_path.into()),
            cv_id: Some(cv_id.into()),
        }
    }

    /// Parse a JSON request body.
    pub fn from_json(body: &str) -> Result<Self, ResumeError> {
        if body.trim().is_empty() {
            return Err(ResumeError::Validation("no JSON received in request".into()));
        }
        serde_json::from_str(body)
            .map_err(|e| ResumeError::Validation(format!("request is not valid JSON: {e}")))
    }

    /// Check required fields and return the object name and id.
    pub fn validate(&self) -> Result<(String, Value), ResumeError> {
        let path = self
            .original_cv_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ResumeError::Validation("'original_cv_path' is required".into()))?;

        let cv_id = match &self.cv_id {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v @ (Value::String(_) | Value::Number(_))) => Some(v.clone()),
            Some(_) => {
                return Err(ResumeError::Validation(
                    "'cv_id' must be a string or a number".into(),
                ))
            }
        }
        .ok_or_else(|| ResumeError::Validation("'cv_id' is required".into()))?;

        let file_name = file_name_from_path(path);
        if file_name.is_empty() {
            return Err(ResumeError::Validation(format!(
                "'{path}' does not name a file"
            )));
        }
        Ok((file_name, cv_id))
    }
}

/// Percent-decoded last `/`-separated segment of `path`.
pub fn file_name_from_path(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    percent_decode_str(last).decode_utf8_lossy().into_owned()
}

/// Report object name for a résumé file name: `<stem>_summary.pdf`.
pub fn report_name(file_name: &str) -> String {
    let stem = if file_name.to_ascii_lowercase().ends_with(".pdf") {
        &file_name[..file_name.len() - 4]
    } else {
        file_name
    };
    format!("{stem}{REPORT_SUFFIX}")
}

/// The record plus the caller's id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateCvData {
    #[serde(flatten)]
    pub record: StructuredRecord,
    pub cv_id: Value,
}

/// Response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResponse {
    pub summarized_cv_path: String,
    pub candidate_cv_data: CandidateCvData,
}

/// Runs the whole summarize flow against injected collaborators.
pub struct Summarizer {
    store: Arc<dyn ObjectStore>,
    pipeline: Pipeline,
    renderer: Arc<dyn ReportRenderer>,
    source_bucket: String,
    report_bucket: String,
}

impl Summarizer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        pipeline: Pipeline,
        renderer: Arc<dyn ReportRenderer>,
        source_bucket: impl Into<String>,
        report_bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            pipeline,
            renderer,
            source_bucket: source_bucket.into(),
            report_bucket: report_bucket.into(),
        }
    }

    pub async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, ResumeError> {
        let progress = self.pipeline.progress();
        let (file_name, cv_id) = request.validate()?;
        info!("Summarizing '{}' (cv_id {})", file_name, cv_id);

        let (bytes, _) = run_stage(
            progress,
            Stage::Retrieve,
            self.store.download(&self.source_bucket, &file_name),
        )
        .await?;
        let record = self.pipeline.run(&RawDocument::new(bytes)).await?;

        let report_key = report_name(&file_name);
        let tmpdir = tempfile::TempDir::with_prefix("resume-digest")
            .map_err(|e| ResumeError::Render {
                detail: format!("cannot create temp dir: {e}"),
            })?;
        let report_path = tmpdir.path().join(&report_key);

        run_stage(
            progress,
            Stage::Render,
            self.renderer.render(&record, &report_path),
        )
        .await?;
        let (url, _) = run_stage(
            progress,
            Stage::Upload,
            self.store
                .upload(&self.report_bucket, &report_key, &report_path),
        )
        .await?;

        info!("Summary report available at {}", url);
        Ok(SummaryResponse {
            summarized_cv_path: url,
            candidate_cv_data: CandidateCvData { record, cv_id },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_name_is_last_segment_decoded() {
        assert_eq!(
            file_name_from_path("https://storage.googleapis.com/cvs/John%20Doe%20CV.pdf"),
            "John Doe CV.pdf"
        );
        assert_eq!(file_name_from_path("jane.pdf"), "jane.pdf");
        assert_eq!(file_name_from_path("folder/"), "");
    }

    #[test]
    fn report_names() {
        assert_eq!(report_name("John Doe CV.pdf"), "John Doe CV_summary.pdf");
        assert_eq!(report_name("scan.PDF"), "scan_summary.pdf");
        assert_eq!(report_name("scan"), "scan_summary.pdf");
    }

    #[test]
    fn validate_accepts_string_and_numeric_ids() {
        let (name, id) = SummaryRequest::new("cvs/a%2Bb.pdf", 42).validate().unwrap();
        assert_eq!(name, "a+b.pdf");
        assert_eq!(id, json!(42));

        let (_, id) = SummaryRequest::new("a.pdf", "cv-7").validate().unwrap();
        assert_eq!(id, json!("cv-7"));
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let missing_path = SummaryRequest::from_json(r#"{"cv_id": 1}"#).unwrap();
        assert!(matches!(missing_path.validate(), Err(ResumeError::Validation(_))));

        let blank_id = SummaryRequest::from_json(r#"{"original_cv_path": "a.pdf", "cv_id": " "}"#).unwrap();
        assert!(matches!(blank_id.validate(), Err(ResumeError::Validation(_))));

        let null_id = SummaryRequest::from_json(r#"{"original_cv_path": "a.pdf", "cv_id": null}"#).unwrap();
        assert!(null_id.validate().is_err());

        let object_id = SummaryRequest::new("a.pdf", json!({"id": 1}));
        assert!(object_id.validate().is_err());
    }

    #[test]
    fn from_json_rejects_empty_and_garbage() {
        assert!(matches!(SummaryRequest::from_json(""), Err(ResumeError::Validation(_))));
        let err = SummaryRequest::from_json("cv_id=1").unwrap_err();
        assert_eq!(err.stage(), Stage::Request);
    }

    #[test]
    fn response_flattens_record_with_id() {
        let record: StructuredRecord = serde_json::from_value(json!({
            "basic_info": {"name": "jane"},
            "work_experience": [], "education": [], "languages": [],
            "skills": [], "certification": []
        }))
        .unwrap();
        let response = SummaryResponse {
            summarized_cv_path: "https://storage.googleapis.com/reports/jane_summary.pdf".into(),
            candidate_cv_data: CandidateCvData {
                record,
                cv_id: json!("cv-1"),
            },
        };
        let v = serde_json::to_value(&response).unwrap();
        assert_eq!(v["candidate_cv_data"]["cv_id"], "cv-1");
        assert_eq!(v["candidate_cv_data"]["basic_info"]["name"], "jane");
        assert_eq!(v["candidate_cv_data"]["basic_info"]["email"], "Unknown");
        assert!(v["summarized_cv_path"].as_str().unwrap().ends_with("jane_summary.pdf"));
    }
}
