//! CLI binary for resume-digest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, wires up collaborators and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use resume_digest::{
    digest, GcsObjectStore, LocalObjectStore, ObjectStore, PdfiumReportRenderer,
    Pipeline, PipelineConfig, PipelineProgressCallback, ProgressCallback, ReportRenderer, Stage,
    StorageConfig, StorageCredentials, Summarizer, SummaryRequest,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Request => "Validating request",
        Stage::Retrieve => "Fetching document",
        Stage::Ocr => "Recognising text",
        Stage::Canonicalize => "Normalising text",
        Stage::Extract => "Extracting record",
        Stage::Render => "Rendering report",
        Stage::Upload => "Uploading report",
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.as_str());
        self.bar.set_message(format!("{}…", stage_label(stage)));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<14} {}",
            green("✓"),
            stage.as_str(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg = match error.char_indices().nth(100) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar
            .println(format!("  {} {:<14} {}", red("✗"), stage.as_str(), red(&msg)));
    }

    fn on_run_complete(&self, _success: bool) {
        self.bar.set_prefix("");
        self.bar.set_message("");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Structured record of a local résumé (stdout)
  resume-digest cv.pdf

  # Write the record to a file and render the summary report
  resume-digest cv.pdf -o cv.json --report cv_summary.pdf

  # Inspect the normalised OCR text only (no API key needed)
  resume-digest --canonical-only cv.pdf

  # Full summarize flow against Cloud Storage
  resume-digest --cv-id 42 --source-bucket cvs --report-bucket reports \
      "https://storage.googleapis.com/cvs/John%20Doe.pdf"

  # Same flow against a local directory standing in for the buckets
  resume-digest --storage-root ./buckets --cv-id 42 \
      --source-bucket cvs --report-bucket reports "John Doe.pdf"

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  GCS_ACCESS_TOKEN        OAuth2 bearer token for Cloud Storage
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Log filter (overrides --verbose / --quiet)

SETUP:
  Needs the `tesseract` binary (with the requested language packs) on PATH
  and a pdfium shared library, either installed system-wide or pointed at
  with --pdfium-lib.
"#;

/// Turn scanned résumé PDFs into structured candidate records.
#[derive(Parser, Debug)]
#[command(
    name = "resume-digest",
    version,
    about = "Turn scanned résumé PDFs into structured candidate records",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF path, HTTP/HTTPS URL, or gs://bucket/object URI. With
    /// --cv-id, the résumé's storage path.
    input: String,

    /// Write the record JSON to this file instead of stdout.
    #[arg(short, long, env = "RESUME_DIGEST_OUTPUT")]
    output: Option<PathBuf>,

    /// Also render the "CV Summary" PDF to this path.
    #[arg(long, env = "RESUME_DIGEST_REPORT")]
    report: Option<PathBuf>,

    /// Stop after canonicalisation and print the normalised text.
    #[arg(long)]
    canonical_only: bool,

    /// Print raw text, canonical text and stats alongside the record.
    #[arg(long)]
    details: bool,

    /// Run the summarize flow for this candidate id.
    #[arg(long, env = "RESUME_DIGEST_CV_ID", requires_all = ["source_bucket", "report_bucket"])]
    cv_id: Option<String>,

    /// Bucket holding the original résumés.
    #[arg(long, env = "RESUME_DIGEST_SOURCE_BUCKET")]
    source_bucket: Option<String>,

    /// Bucket receiving summary reports.
    #[arg(long, env = "RESUME_DIGEST_REPORT_BUCKET")]
    report_bucket: Option<String>,

    /// Use this directory as object storage (one sub-directory per bucket)
    /// instead of Cloud Storage.
    #[arg(long, env = "RESUME_DIGEST_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// OAuth2 bearer token for Cloud Storage.
    #[arg(long, env = "GCS_ACCESS_TOKEN", hide_env_values = true)]
    gcs_token: Option<String>,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI for OCR (72–600).
    #[arg(long, env = "RESUME_DIGEST_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "RESUME_DIGEST_PSM", default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Tesseract language(s), e.g. eng or eng+ind.
    #[arg(long, env = "RESUME_DIGEST_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract executable.
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt. `{template}`
    /// is replaced with the schema template.
    #[arg(long, env = "RESUME_DIGEST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "RESUME_DIGEST_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "RESUME_DIGEST_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "RESUME_DIGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "RESUME_DIGEST_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "RESUME_DIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RESUME_DIGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RESUME_DIGEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs; verbose mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = progress
        .clone()
        .map(|cb| cb as Arc<dyn PipelineProgressCallback>);

    let config = build_config(&cli, progress_cb).await?;
    let result = run(&cli, &config).await;

    if let Some(cb) = progress {
        cb.bar.finish_and_clear();
    }
    result
}

async fn run(cli: &Cli, config: &PipelineConfig) -> Result<()> {
    let store = build_store(cli)?;

    // ── Canonical-only mode ──────────────────────────────────────────────
    if cli.canonical_only {
        let pipeline = Pipeline::new(
            Arc::new(resume_digest::OcrAdapter::from_config(config)),
            Arc::new(NoModel),
            config,
        );
        let document = resume_digest::resolve_input(
            &cli.input,
            store.as_deref(),
            config.download_timeout_secs,
        )
        .await
        .context("Failed to load document")?;
        let (_, canonical) = pipeline
            .canonical_text(&document)
            .await
            .context("Text recognition failed")?;
        println!("{canonical}");
        return Ok(());
    }

    let pipeline = Pipeline::from_config(config).context("Failed to set up the pipeline")?;
    let renderer: Arc<dyn ReportRenderer> =
        Arc::new(PdfiumReportRenderer::new(config.pdfium_library_path.clone()));

    // ── Summarize flow ───────────────────────────────────────────────────
    if let Some(ref cv_id) = cli.cv_id {
        let store = store.context("No object storage configured")?;
        let summarizer = Summarizer::new(
            store,
            pipeline,
            renderer,
            cli.source_bucket.clone().unwrap_or_default(),
            cli.report_bucket.clone().unwrap_or_default(),
        );
        let response = summarizer
            .summarize(&SummaryRequest::new(cli.input.clone(), cv_id.clone()))
            .await
            .context("Summarize failed")?;
        let json = serde_json::to_string_pretty(&response).context("Failed to serialise response")?;
        return emit(cli.output.as_deref(), &json, cli.quiet).await;
    }

    // ── Digest ───────────────────────────────────────────────────────────
    let output = digest(&pipeline, &cli.input, store.as_deref(), config)
        .await
        .context("Digest failed")?;

    if let Some(ref report_path) = cli.report {
        renderer
            .render(&output.record, report_path)
            .await
            .context("Failed to render report")?;
        if !cli.quiet {
            eprintln!("{} report  →  {}", green("✔"), bold(&report_path.display().to_string()));
        }
    }

    let json = if cli.details {
        serde_json::to_string_pretty(&serde_json::json!({
            "raw_text": output.raw_text.as_str(),
            "canonical_text": &output.canonical_text,
            "record": &output.record,
            "stats": &output.stats,
        }))
    } else {
        serde_json::to_string_pretty(&output.record)
    }
    .context("Failed to serialise record")?;
    emit(cli.output.as_deref(), &json, cli.quiet).await?;

    if !cli.quiet {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
    }
    Ok(())
}

/// Write JSON to `path` (atomically) or stdout.
async fn emit(path: Option<&Path>, json: &str, quiet: bool) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, json)
                .await
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            tokio::fs::rename(&tmp, path)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!("{} record  →  {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{json}").context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// Object store for gs:// inputs and the summarize flow, if one is configured.
fn build_store(cli: &Cli) -> Result<Option<Arc<dyn ObjectStore>>> {
    if let Some(ref root) = cli.storage_root {
        return Ok(Some(Arc::new(LocalObjectStore::new(root))));
    }
    if cli.gcs_token.is_some() || cli.input.starts_with("gs://") || cli.cv_id.is_some() {
        let credentials = match cli.gcs_token {
            Some(ref token) => StorageCredentials::bearer(token),
            None => StorageCredentials::anonymous(),
        };
        let store = GcsObjectStore::new(StorageConfig::new(credentials))
            .context("Failed to set up Cloud Storage client")?;
        return Ok(Some(Arc::new(store)));
    }
    Ok(None)
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = PipelineConfig::builder()
        .dpi(cli.dpi)
        .page_segmentation_mode(cli.psm)
        .ocr_language(cli.lang.clone())
        .tesseract_command(cli.tesseract.clone())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(dir.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Completion client for `--canonical-only`, which never reaches extraction.
struct NoModel;

#[async_trait::async_trait]
impl resume_digest::CompletionClient for NoModel {
    async fn complete(
        &self,
        _request: &resume_digest::CompletionRequest,
    ) -> Result<resume_digest::Completion, resume_digest::ResumeError> {
        Err(resume_digest::ResumeError::Internal(
            "no model is configured in canonical-only mode".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_summarize_flags() {
        let cli = Cli::try_parse_from([
            "resume-digest",
            "--cv-id",
            "42",
            "--source-bucket",
            "cvs",
            "--report-bucket",
            "reports",
            "cvs/John%20Doe.pdf",
        ])
        .unwrap();
        assert_eq!(cli.cv_id.as_deref(), Some("42"));
        assert_eq!(
            resume_digest::report_name("John Doe.pdf"),
            "John Doe_summary.pdf"
        );
    }

    #[test]
    fn cv_id_requires_buckets() {
        assert!(Cli::try_parse_from(["resume-digest", "--cv-id", "42", "a.pdf"]).is_err());
    }

    #[test]
    fn psm_is_range_checked() {
        assert!(Cli::try_parse_from(["resume-digest", "--psm", "14", "a.pdf"]).is_err());
    }
}
