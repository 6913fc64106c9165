//! Pipeline orchestrator: [`RawDocument`] → [`StructuredRecord`].
//!
//! A run is a straight line with no branching:
//!
//! ```text
//! RawDocument ─▶ ocr ─▶ RawText ─▶ canonicalize ─▶ CanonicalText ─▶ extract ─▶ StructuredRecord
//! ```
//!
//! The first failing stage ends the run and its error is returned as-is;
//! there is no partial record and no retry. Collaborators are injected as
//! trait objects, so the same [`Pipeline`] type runs against pdfium and
//! tesseract in production and against stubs in tests.

use crate::config::PipelineConfig;
use crate::document::{CanonicalText, RawDocument, RawText};
use crate::error::{ResumeError, Stage};
use crate::output::{DigestOutput, DigestStats};
use crate::pipeline::canonicalize::canonicalize;
use crate::pipeline::extract::SchemaExtractor;
use crate::pipeline::input;
use crate::pipeline::llm::{CompletionClient, LlmCompletionClient};
use crate::pipeline::ocr::{OcrAdapter, TextExtractor};
use crate::progress::ProgressCallback;
use crate::schema::{SchemaTemplate, StructuredRecord};
use crate::storage::ObjectStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// The résumé extraction pipeline.
pub struct Pipeline {
    ocr: Arc<dyn TextExtractor>,
    extractor: SchemaExtractor,
    template: SchemaTemplate,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        ocr: Arc<dyn TextExtractor>,
        client: Arc<dyn CompletionClient>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            ocr,
            extractor: SchemaExtractor::new(client, config),
            template: SchemaTemplate::resume(),
            progress: config.progress_callback.clone(),
        }
    }

    /// pdfium + tesseract + the resolved LLM provider.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ResumeError> {
        let client = LlmCompletionClient::from_config(config)?;
        Ok(Self::new(
            Arc::new(OcrAdapter::from_config(config)),
            Arc::new(client),
            config,
        ))
    }

    /// Use a different schema template.
    pub fn with_template(mut self, template: SchemaTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn template(&self) -> &SchemaTemplate {
        &self.template
    }

    pub(crate) fn progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_ref()
    }

    /// Run the pipeline and return the record.
    pub async fn run(&self, document: &RawDocument) -> Result<StructuredRecord, ResumeError> {
        self.run_detailed(document).await.map(|out| out.record)
    }

    /// Run the pipeline, keeping intermediate text and stats.
    pub async fn run_detailed(&self, document: &RawDocument) -> Result<DigestOutput, ResumeError> {
        let total_start = Instant::now();
        if let Some(cb) = &self.progress {
            cb.on_run_start();
        }

        let result = self.run_stages(document).await;

        if let Some(cb) = &self.progress {
            cb.on_run_complete(result.is_ok());
        }
        let (raw_text, canonical_text, record, mut stats) = result?;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Digest complete: {} → {} chars, {} in / {} out tokens, {}ms total",
            stats.raw_chars,
            stats.canonical_chars,
            stats.input_tokens,
            stats.output_tokens,
            stats.total_duration_ms
        );

        Ok(DigestOutput {
            raw_text,
            canonical_text,
            record,
            stats,
        })
    }

    /// OCR and canonicalisation only; no model call.
    pub async fn canonical_text(
        &self,
        document: &RawDocument,
    ) -> Result<(RawText, CanonicalText), ResumeError> {
        let (raw, _) = run_stage(self.progress(), Stage::Ocr, self.ocr.extract(document)).await?;
        let (canonical, _) = run_stage(self.progress(), Stage::Canonicalize, async {
            Ok(canonicalize(&raw))
        })
        .await?;
        Ok((raw, canonical))
    }

    /// Blocking wrapper around [`Self::run`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// one.
    pub fn run_sync(&self, document: &RawDocument) -> Result<StructuredRecord, ResumeError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ResumeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run(document))
    }

    async fn run_stages(
        &self,
        document: &RawDocument,
    ) -> Result<(RawText, CanonicalText, StructuredRecord, DigestStats), ResumeError> {
        let progress = self.progress();

        // ── Step 1: OCR ──────────────────────────────────────────────────
        let (raw, ocr_ms) = run_stage(progress, Stage::Ocr, self.ocr.extract(document)).await?;

        // ── Step 2: Canonicalise ─────────────────────────────────────────
        let (canonical, canon_ms) = run_stage(progress, Stage::Canonicalize, async {
            Ok(canonicalize(&raw))
        })
        .await?;
        debug!("Canonical text: {}", canonical);

        // ── Step 3: Extract ──────────────────────────────────────────────
        let ((record, usage), extract_ms) = run_stage(
            progress,
            Stage::Extract,
            self.extractor.extract_with_usage(&canonical, &self.template),
        )
        .await?;

        let stats = DigestStats {
            raw_chars: raw.as_str().chars().count(),
            canonical_chars: canonical.as_str().chars().count(),
            input_tokens: usage.input_tokens as u64,
            output_tokens: usage.output_tokens as u64,
            ocr_duration_ms: ocr_ms,
            canonicalize_duration_ms: canon_ms,
            extract_duration_ms: extract_ms,
            total_duration_ms: 0,
        };
        Ok((raw, canonical, record, stats))
    }
}

/// Await one stage, emitting progress events and timing it.
pub(crate) async fn run_stage<T, F>(
    progress: Option<&ProgressCallback>,
    stage: Stage,
    fut: F,
) -> Result<(T, u64), ResumeError>
where
    F: Future<Output = Result<T, ResumeError>>,
{
    if let Some(cb) = progress {
        cb.on_stage_start(stage);
    }
    let start = Instant::now();

    match fut.await {
        Ok(value) => {
            let ms = start.elapsed().as_millis() as u64;
            debug!("Stage {} finished in {}ms", stage, ms);
            if let Some(cb) = progress {
                cb.on_stage_complete(stage, ms);
            }
            Ok((value, ms))
        }
        Err(e) => {
            error!("Stage {} failed: {}", stage, e);
            if let Some(cb) = progress {
                cb.on_stage_error(stage, &e.to_string());
            }
            Err(e)
        }
    }
}

/// Resolve `input` (path, URL or `gs://` URI) and run the pipeline on it.
///
/// This is the primary entry point for one-off use.
///
/// # Example
/// ```rust,no_run
/// use resume_digest::{digest, Pipeline, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::default();
/// let pipeline = Pipeline::from_config(&config)?;
/// let output = digest(&pipeline, "cv.pdf", None, &config).await?;
/// println!("{}", serde_json::to_string_pretty(&output.record)?);
/// # Ok(())
/// # }
/// ```
pub async fn digest(
    pipeline: &Pipeline,
    input_str: impl AsRef<str>,
    store: Option<&dyn ObjectStore>,
    config: &PipelineConfig,
) -> Result<DigestOutput, ResumeError> {
    let input_str = input_str.as_ref();
    info!("Starting digest: {}", input_str);

    let (document, _) = run_stage(
        pipeline.progress(),
        Stage::Retrieve,
        input::resolve_input(input_str, store, config.download_timeout_secs),
    )
    .await?;
    pipeline.run_detailed(&document).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{Completion, CompletionRequest};
    use crate::progress::PipelineProgressCallback;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedText(Result<&'static str, ()>);

    #[async_trait]
    impl TextExtractor for FixedText {
        async fn extract(&self, _: &RawDocument) -> Result<RawText, ResumeError> {
            match self.0 {
                Ok(t) => Ok(RawText::from(t)),
                Err(()) => Err(ResumeError::Recognition {
                    page: 1,
                    detail: "tesseract not installed".into(),
                }),
            }
        }
    }

    struct Reply(&'static str);

    #[async_trait]
    impl CompletionClient for Reply {
        async fn complete(&self, _: &CompletionRequest) -> Result<Completion, ResumeError> {
            Ok(Completion {
                content: self.0.to_string(),
                prompt_tokens: 10,
                completion_tokens: 5,
            })
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl PipelineProgressCallback for Events {
        fn on_stage_start(&self, stage: Stage) {
            self.0.lock().unwrap().push(format!("start:{stage}"));
        }
        fn on_stage_complete(&self, stage: Stage, _: u64) {
            self.0.lock().unwrap().push(format!("done:{stage}"));
        }
        fn on_stage_error(&self, stage: Stage, _: &str) {
            self.0.lock().unwrap().push(format!("error:{stage}"));
        }
        fn on_run_complete(&self, success: bool) {
            self.0.lock().unwrap().push(format!("end:{success}"));
        }
    }

    const RECORD: &str = r#"{"basic_info": {"name": "john doe", "email": "john@gmail.com",
        "phone_number": "081234567890", "location": "Unknown"},
        "work_experience": [], "education": [], "languages": [], "skills": [],
        "certification": []}"#;

    fn pipeline(ocr: FixedText, reply: &'static str, events: Arc<Events>) -> Pipeline {
        let config = PipelineConfig::builder()
            .progress_callback(events)
            .build()
            .unwrap();
        Pipeline::new(Arc::new(ocr), Arc::new(Reply(reply)), &config)
    }

    fn doc() -> RawDocument {
        RawDocument::new(b"%PDF-1.7".to_vec())
    }

    #[tokio::test]
    async fn stages_run_in_order() {
        let events = Arc::new(Events::default());
        let p = pipeline(FixedText(Ok("John Doe\njohn@gmail.com\n0812-3456-7890")), RECORD, events.clone());
        let out = p.run_detailed(&doc()).await.unwrap();

        assert_eq!(out.canonical_text.as_str(), "john doe john@gmail.com 081234567890");
        assert_eq!(out.record.basic_info.phone_number, "081234567890");
        assert_eq!(out.stats.input_tokens, 10);
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![
                "start:ocr",
                "done:ocr",
                "start:canonicalize",
                "done:canonicalize",
                "start:extract",
                "done:extract",
                "end:true"
            ]
        );
    }

    #[tokio::test]
    async fn ocr_failure_aborts_before_extraction() {
        let events = Arc::new(Events::default());
        let p = pipeline(FixedText(Err(())), RECORD, events.clone());
        let err = p.run(&doc()).await.unwrap_err();

        assert_eq!(err.stage(), Stage::Ocr);
        assert_eq!(
            *events.0.lock().unwrap(),
            vec!["start:ocr", "error:ocr", "end:false"]
        );
    }

    #[tokio::test]
    async fn canonical_text_skips_the_model() {
        let events = Arc::new(Events::default());
        let p = pipeline(FixedText(Ok("Page 3\nJane")), "not json", events.clone());
        let (raw, canonical) = p.canonical_text(&doc()).await.unwrap();
        assert_eq!(raw.as_str(), "Page 3\nJane");
        assert_eq!(canonical.as_str(), "jane");
        assert!(!events.0.lock().unwrap().iter().any(|e| e.contains("extract")));
    }

    #[test]
    fn run_sync_outside_runtime() {
        let p = pipeline(FixedText(Ok("John Doe")), RECORD, Arc::new(Events::default()));
        let record = p.run_sync(&doc()).unwrap();
        assert_eq!(record.basic_info.name, "john doe");
        // No digits or address in the text.
        assert_eq!(record.basic_info.phone_number, "Unknown");
        assert_eq!(record.basic_info.email, "Unknown");
    }
}
