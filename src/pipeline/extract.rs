//! Schema extraction: canonical text → [`StructuredRecord`] via the LLM.
//!
//! ## Payload tolerance
//!
//! Models asked for "only JSON" still wrap the object in prose or code
//! fences now and then. [`extract_payload_span`] takes everything from the
//! first `{` to the last `}` and leaves the rest behind. It is deliberately
//! separate from [`parse_record`] so the tolerance policy can change without
//! touching parsing.
//!
//! ## No fabrication
//!
//! The prompt tells the model to write `Unknown` for anything absent. As a
//! backstop, contact fields that cannot come from the text are reset to
//! [`UNKNOWN`]: a phone number when the text holds no phone-like digit run,
//! an e-mail when it holds no address.

use crate::config::PipelineConfig;
use crate::document::CanonicalText;
use crate::error::ResumeError;
use crate::pipeline::llm::{CompletionClient, CompletionRequest};
use crate::prompts;
use crate::schema::{SchemaTemplate, StructuredRecord, UNKNOWN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Byte range of the candidate JSON object inside a completion.
///
/// Returns `None` when there is no `{`, no `}`, or the last `}` comes before
/// the first `{`.
pub fn extract_payload_span(response: &str) -> Option<Range<usize>> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(start..end + 1)
}

/// Parse a raw completion into a record of the template's shape.
///
/// Any failure is a [`ResumeError::MalformedResponse`] carrying `raw`.
pub fn parse_record(raw: &str, template: &SchemaTemplate) -> Result<StructuredRecord, ResumeError> {
    let malformed = |detail: String| ResumeError::MalformedResponse {
        detail,
        raw: raw.to_string(),
    };

    let span = extract_payload_span(raw)
        .ok_or_else(|| malformed("no JSON object found in response".to_string()))?;
    let payload = &raw[span];

    let value: Value =
        serde_json::from_str(payload).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    template.check_shape(&value).map_err(malformed)?;

    let mut record: StructuredRecord = serde_json::from_value(value)
        .map_err(|e| malformed(format!("record does not match template: {e}")))?;
    record.dedup_sets();
    Ok(record)
}

// A compact digit run (what the phone rules leave behind), or a grouped
// number that opens with `+`, `(` or a trunk `0`. Year ranges such as
// "2019 - 2021" match neither form.
static RE_PHONE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{9,15}\b|(?:\+|\(\+?|\b0)\d[\d\s().-]{6,}\d").unwrap()
});
static RE_EMAIL_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\s@]+@[^\s@]+\.[^\s@]+").unwrap());

const MIN_PHONE_DIGITS: usize = 9;

/// Whether `text` holds something that reads as a phone number.
pub fn has_phone_like(text: &str) -> bool {
    RE_PHONE_LIKE.find_iter(text).any(|m| {
        m.as_str().chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
    })
}

/// Reset contact fields the text cannot have supplied.
pub fn guard_fabricated_contacts(record: &mut StructuredRecord, text: &str) {
    let info = &mut record.basic_info;
    if info.phone_number != UNKNOWN && !has_phone_like(text) {
        warn!("Model returned a phone number for text without one; using '{UNKNOWN}'");
        info.phone_number = UNKNOWN.to_string();
    }
    if info.email != UNKNOWN && !RE_EMAIL_LIKE.is_match(text) {
        warn!("Model returned an e-mail for text without one; using '{UNKNOWN}'");
        info.email = UNKNOWN.to_string();
    }
}

/// Token usage of one extraction call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Calls the completion capability and validates its answer.
pub struct SchemaExtractor {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    max_tokens: usize,
    system_prompt: Option<String>,
}

impl SchemaExtractor {
    /// The client's own model, when it reports one, names the request;
    /// otherwise the configured model id does.
    pub fn new(client: Arc<dyn CompletionClient>, config: &PipelineConfig) -> Self {
        let model = client.model().unwrap_or(config.model_id()).to_string();
        Self {
            client,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
        }
    }

    /// Build the single completion request for `text`.
    pub fn build_request(&self, text: &CanonicalText, template: &SchemaTemplate) -> CompletionRequest {
        CompletionRequest {
            system: prompts::system_prompt(template, self.system_prompt.as_deref()),
            user: prompts::user_prompt(text.as_str(), template),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Extract a record from canonical text.
    pub async fn extract(
        &self,
        text: &CanonicalText,
        template: &SchemaTemplate,
    ) -> Result<StructuredRecord, ResumeError> {
        self.extract_with_usage(text, template)
            .await
            .map(|(record, _)| record)
    }

    /// Like [`Self::extract`], also returning token usage.
    pub async fn extract_with_usage(
        &self,
        text: &CanonicalText,
        template: &SchemaTemplate,
    ) -> Result<(StructuredRecord, TokenUsage), ResumeError> {
        let request = self.build_request(text, template);
        debug!(
            "Requesting extraction from '{}' ({} chars of text, template {})",
            request.model,
            text.as_str().len(),
            template.version
        );

        let completion = self.client.complete(&request).await?;
        let usage = TokenUsage {
            input_tokens: completion.prompt_tokens,
            output_tokens: completion.completion_tokens,
        };

        let mut record = parse_record(&completion.content, template).inspect_err(|e| {
            if let ResumeError::MalformedResponse { detail, raw } = e {
                error!("Failed to parse completion: {}", detail);
                error!("Raw output: {}", raw);
            }
        })?;
        guard_fabricated_contacts(&mut record, text.as_str());
        Ok((record, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RawText;
    use crate::pipeline::canonicalize::canonicalize;
    use crate::pipeline::llm::Completion;
    use crate::schema::is_unknown;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const RECORD: &str = r#"{
        "basic_info": {"name": "john doe", "email": "john@gmail.com",
                       "phone_number": "081234567890", "location": "Unknown"},
        "work_experience": [],
        "education": [],
        "languages": ["english"],
        "skills": ["python", "python"],
        "certification": []
    }"#;

    struct StubClient {
        reply: Result<String, String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl StubClient {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(detail: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(detail.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ResumeError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(Completion {
                    content: text.clone(),
                    prompt_tokens: 900,
                    completion_tokens: 120,
                }),
                Err(detail) => Err(ResumeError::Extraction {
                    detail: detail.clone(),
                }),
            }
        }
    }

    fn text(s: &str) -> CanonicalText {
        canonicalize(&RawText::from(s))
    }

    #[test]
    fn span_of_bare_object() {
        assert_eq!(extract_payload_span("{}"), Some(0..2));
    }

    #[test]
    fn span_ignores_surrounding_prose() {
        let raw = "Sure! Here is the JSON:\n```json\n{\"a\": {\"b\": 1}}\n```\nHope it helps.";
        let span = extract_payload_span(raw).unwrap();
        assert_eq!(&raw[span], "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn span_absent_or_reversed() {
        assert_eq!(extract_payload_span("no json here"), None);
        assert_eq!(extract_payload_span("only { open"), None);
        assert_eq!(extract_payload_span("} backwards {"), None);
    }

    #[test]
    fn parse_record_from_wrapped_response() {
        let raw = format!("Here you go:\n{RECORD}\nLet me know!");
        let record = parse_record(&raw, &SchemaTemplate::resume()).unwrap();
        assert_eq!(record.basic_info.name, "john doe");
        assert_eq!(record.skills, vec!["python".to_string()]);
    }

    #[test]
    fn parse_record_without_braces_is_malformed() {
        let raw = "I could not find any information.";
        let err = parse_record(raw, &SchemaTemplate::resume()).unwrap_err();
        assert_eq!(err.raw_response(), Some(raw));
    }

    #[test]
    fn parse_record_unbalanced_is_malformed() {
        let raw = r#"{"basic_info": {"name": "john"}, "skills": ["a"}"#;
        let err = parse_record(raw, &SchemaTemplate::resume()).unwrap_err();
        assert!(matches!(err, ResumeError::MalformedResponse { .. }));
        assert_eq!(err.raw_response(), Some(raw));
    }

    #[test]
    fn parse_record_wrong_shape_is_malformed() {
        let raw = r#"{"name": "john doe", "email": "john@gmail.com"}"#;
        let err = parse_record(raw, &SchemaTemplate::resume()).unwrap_err();
        match err {
            ResumeError::MalformedResponse { detail, raw: kept } => {
                assert!(detail.contains("basic_info"), "{detail}");
                assert_eq!(kept, raw);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn guard_resets_phone_without_digits_in_text() {
        let mut record = parse_record(RECORD, &SchemaTemplate::resume()).unwrap();
        guard_fabricated_contacts(&mut record, "john doe data analyst jakarta");
        assert!(is_unknown(&record.basic_info.phone_number));
        assert!(is_unknown(&record.basic_info.email));
        assert_eq!(record.basic_info.name, "john doe");
    }

    #[test]
    fn guard_ignores_year_ranges() {
        for text in [
            "john doe data analyst pt maju 2019 - 2021",
            "s1 statistics universitas indonesia 2014 2018 2019 - present",
            "acme corp 2015 - 2017 2017 - 2021",
        ] {
            let mut record = parse_record(RECORD, &SchemaTemplate::resume()).unwrap();
            guard_fabricated_contacts(&mut record, text);
            assert_eq!(record.basic_info.phone_number, UNKNOWN, "text: {text}");
        }
    }

    #[test]
    fn phone_like_forms() {
        assert!(has_phone_like("call 081234567890 today"));
        assert!(has_phone_like("0812 3456 7890"));
        assert!(has_phone_like("+1 (555) 123-4567"));
        assert!(has_phone_like("(021) 555-1234"));
        assert!(!has_phone_like("2019 - 2021"));
        assert!(!has_phone_like("2014 2018 2019"));
        assert!(!has_phone_like("call 0812"));
    }

    #[test]
    fn guard_keeps_contacts_present_in_text() {
        let mut record = parse_record(RECORD, &SchemaTemplate::resume()).unwrap();
        guard_fabricated_contacts(&mut record, "john doe john@gmail.com 081234567890");
        assert_eq!(record.basic_info.phone_number, "081234567890");
        assert_eq!(record.basic_info.email, "john@gmail.com");
    }

    #[tokio::test]
    async fn extract_builds_deterministic_request() {
        let client = StubClient::replying(RECORD);
        let config = PipelineConfig::builder().model("test-model").build().unwrap();
        let extractor = SchemaExtractor::new(client.clone(), &config);

        let t = text("John Doe\njohn @gmail com\n0812-3456-7890");
        let (record, usage) = extractor
            .extract_with_usage(&t, &SchemaTemplate::resume())
            .await
            .unwrap();

        assert_eq!(record.basic_info.email, "john@gmail.com");
        assert_eq!(usage.input_tokens, 900);
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "test-model");
        assert_eq!(seen[0].temperature, 0.0);
        assert!(seen[0].user.contains("john doe john@gmail.com 081234567890"));
        assert!(seen[0].system.contains("\"basic_info\""));
    }

    #[tokio::test]
    async fn extract_without_phone_in_text_yields_unknown() {
        let client = StubClient::replying(RECORD);
        let extractor = SchemaExtractor::new(client, &PipelineConfig::default());
        let record = extractor
            .extract(&text("John Doe\nSoftware Engineer\nJakarta"), &SchemaTemplate::resume())
            .await
            .unwrap();
        assert!(is_unknown(&record.basic_info.phone_number));
    }

    #[tokio::test]
    async fn extract_drops_phone_when_text_only_has_dates() {
        let client = StubClient::replying(&RECORD.replace("081234567890", "081299999999"));
        let extractor = SchemaExtractor::new(client, &PipelineConfig::default());
        let record = extractor
            .extract(
                &text("John Doe\nData Analyst\nPT Maju 2019~2021"),
                &SchemaTemplate::resume(),
            )
            .await
            .unwrap();
        assert_eq!(record.basic_info.phone_number, UNKNOWN);
        assert_eq!(record.basic_info.name, "john doe");
    }

    #[tokio::test]
    async fn request_names_the_model_the_client_uses() {
        struct Pinned;

        #[async_trait]
        impl CompletionClient for Pinned {
            fn model(&self) -> Option<&str> {
                Some("provider-model")
            }

            async fn complete(&self, _: &CompletionRequest) -> Result<Completion, ResumeError> {
                Ok(Completion::text(RECORD))
            }
        }

        let config = PipelineConfig::builder().model("configured-model").build().unwrap();
        let extractor = SchemaExtractor::new(Arc::new(Pinned), &config);
        let request = extractor.build_request(&text("john doe"), &SchemaTemplate::resume());
        assert_eq!(request.model, "provider-model");

        let fallback = SchemaExtractor::new(StubClient::replying(RECORD), &config);
        let request = fallback.build_request(&text("john doe"), &SchemaTemplate::resume());
        assert_eq!(request.model, "configured-model");
    }

    #[tokio::test]
    async fn extract_surfaces_client_failure() {
        let client = StubClient::failing("connection refused");
        let extractor = SchemaExtractor::new(client.clone(), &PipelineConfig::default());
        let err = extractor
            .extract(&text("john doe"), &SchemaTemplate::resume())
            .await
            .unwrap_err();
        assert!(matches!(err, ResumeError::Extraction { .. }));
        assert_eq!(client.seen.lock().unwrap().len(), 1, "no retry");
    }

    #[tokio::test]
    async fn extract_malformed_keeps_raw_and_does_not_retry() {
        let client = StubClient::replying("Sorry, I can't do that.");
        let extractor = SchemaExtractor::new(client.clone(), &PipelineConfig::default());
        let err = extractor
            .extract(&text("john doe"), &SchemaTemplate::resume())
            .await
            .unwrap_err();
        assert_eq!(err.raw_response(), Some("Sorry, I can't do that."));
        assert_eq!(client.seen.lock().unwrap().len(), 1);
    }
}
