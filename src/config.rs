//! Configuration types for the résumé pipeline.
//!
//! Every knob of a run lives in [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. Object-store credentials are deliberately kept
//! out of it: they live in [`StorageConfig`] and are handed to the storage
//! adapter when it is constructed, so no stage ever reads credentials from
//! ambient process state.

use crate::error::ResumeError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one pipeline instance.
///
/// # Example
/// ```rust
/// use resume_digest::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(200)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.temperature, 0.0);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rendering DPI for rasterising each page. Range: 72–600. Default: 300.
    ///
    /// Higher values improve recognition of small fonts at the cost of CPU
    /// and memory in both pdfium and tesseract.
    pub dpi: u32,

    /// Cap on the longest rendered edge in pixels. Default: 5000.
    ///
    /// Keeps an oversized page (posters, scanned A3) from allocating a
    /// multi-hundred-megabyte bitmap at 300 DPI.
    pub max_rendered_pixels: u32,

    /// Tesseract page segmentation mode (`--psm`). Range: 0–13. Default: 1
    /// (automatic segmentation with orientation and script detection).
    pub page_segmentation_mode: u8,

    /// Tesseract language pack(s), e.g. "eng" or "eng+ind". Default: "eng".
    pub ocr_language: String,

    /// Tesseract executable. Default: "tesseract" (resolved via `PATH`).
    pub tesseract_command: PathBuf,

    /// Directory containing the pdfium shared library.
    /// If None, binds to the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0 (deterministic extraction).
    pub temperature: f32,

    /// Maximum tokens the model may generate for the record. Default: 4096.
    pub max_tokens: usize,

    /// Timeout for the completion call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Optional stage-progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 5000,
            page_segmentation_mode: 1,
            ocr_language: "eng".to_string(),
            tesseract_command: PathBuf::from("tesseract"),
            pdfium_library_path: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("page_segmentation_mode", &self.page_segmentation_mode)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_command", &self.tesseract_command)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured model, or [`DEFAULT_MODEL`].
    pub fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.page_segmentation_mode = psm;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_command(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_command = cmd.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ResumeError> {
        let c = &self.config;
        if c.page_segmentation_mode > 13 {
            return Err(ResumeError::InvalidConfig(format!(
                "Page segmentation mode must be 0–13, got {}",
                c.page_segmentation_mode
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ResumeError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ResumeError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(ResumeError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Storage ──────────────────────────────────────────────────────────────

/// Credentials for the object store, constructed explicitly by the caller.
#[derive(Clone, Default)]
pub struct StorageCredentials {
    /// OAuth2 bearer token with storage read/write scope.
    pub access_token: Option<String>,
}

impl StorageCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { access_token: None }
    }
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Object-store endpoints and credentials.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// JSON API base URL. Default: `https://storage.googleapis.com`.
    pub api_base: String,
    /// Base of publicly resolvable object URLs.
    pub public_base: String,
    pub credentials: StorageCredentials,
    /// Per-request timeout in seconds. Default: 120.
    pub timeout_secs: u64,
}

impl StorageConfig {
    pub fn new(credentials: StorageCredentials) -> Self {
        Self {
            credentials,
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_base: "https://storage.googleapis.com".to_string(),
            public_base: "https://storage.googleapis.com".to_string(),
            credentials: StorageCredentials::anonymous(),
            timeout_secs: 120,
        }
    }
}
