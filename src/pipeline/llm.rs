//! LLM completion capability.
//!
//! [`CompletionClient`] is the seam between the schema extractor and whatever
//! model answers it. The production implementation, [`LlmCompletionClient`],
//! wraps an `edgequake_llm` provider; tests plug in a stub that returns a
//! canned completion.
//!
//! There is no retry here. A failed or timed-out call is reported once as
//! [`ResumeError::Extraction`] and the request fails.

use crate::config::PipelineConfig;
use crate::error::ResumeError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// One completion request: a system instruction plus a user prompt.
///
/// `model` is the id used in logs and errors. The client decides which model
/// answers; [`SchemaExtractor`](crate::SchemaExtractor) fills `model` from
/// [`CompletionClient::model`] so the two agree.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The model's answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Something that turns a [`CompletionRequest`] into a single completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model that actually serves requests, if the client is bound to one.
    fn model(&self) -> Option<&str> {
        None
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ResumeError>;
}

/// [`CompletionClient`] backed by an `edgequake_llm` provider.
pub struct LlmCompletionClient {
    provider: Arc<dyn LLMProvider>,
    call_timeout: Duration,
}

impl LlmCompletionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    /// Resolve the provider from `config` and wrap it.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ResumeError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(
            provider,
            Duration::from_secs(config.api_timeout_secs),
        ))
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    fn model(&self) -> Option<&str> {
        Some(self.provider.model())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ResumeError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(&request.system),
            ChatMessage::user(&request.user),
        ];
        let options = build_options(request);

        let response = timeout(self.call_timeout, self.provider.chat(&messages, Some(&options)))
            .await
            .map_err(|_| ResumeError::Extraction {
                detail: format!(
                    "no response from model '{}' within {}s",
                    self.provider.model(),
                    self.call_timeout.as_secs()
                ),
            })?
            .map_err(|e| ResumeError::Extraction {
                detail: e.to_string(),
            })?;

        debug!(
            "Completion: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(Completion {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

/// Build `CompletionOptions` from the request.
fn build_options(request: &CompletionRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ResumeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ResumeError::InvalidConfig(format!(
            "LLM provider '{provider_name}' is not configured: {e}"
        ))
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. A pre-built provider in `config.provider`.
/// 2. `config.provider_name` with `config.model_id()`.
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` from the environment.
/// 4. `ProviderFactory::from_env`, which picks the first provider whose API
///    key is set.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, ResumeError> {
    if let Some(ref provider) = config.provider {
        if let Some(ref model) = config.model {
            if model != provider.model() {
                warn!(
                    "Configured model '{}' ignored; provider '{}' is bound to '{}'",
                    model,
                    provider.name(),
                    provider.model()
                );
            }
        }
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        info!("Using LLM provider '{}' with model '{}'", name, config.model_id());
        return create_provider(name, config.model_id());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        ResumeError::InvalidConfig(format!(
            "No LLM provider could be auto-detected from environment. \
Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider. Error: {e}"
        ))
    })?;

    Ok(llm_provider)
}
