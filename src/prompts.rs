//! Prompts for LLM schema extraction.
//!
//! Kept apart from [`crate::pipeline::extract`] so prompt wording can change
//! without touching request or parsing code, and so tests can inspect the
//! exact text sent to the model.

use crate::schema::SchemaTemplate;

/// System instruction. `{template}` is replaced with the schema template body.
pub const SYSTEM_PROMPT: &str = "You are a JSON converter which receives raw CV candidate \
information as a string and returns a structured JSON output by organising the information \
in the string same as the following template:\n\n{template}";

/// Build the system message, honouring a caller override.
pub fn system_prompt(template: &SchemaTemplate, custom: Option<&str>) -> String {
    custom
        .unwrap_or(SYSTEM_PROMPT)
        .replace("{template}", template.body)
}

/// Build the user message embedding the canonical CV text and the template.
pub fn user_prompt(cv_text: &str, template: &SchemaTemplate) -> String {
    format!(
        "Extract the information from:\n\n{cv_text}\n\n\
Return the information in structured JSON format like the template below, strictly using only \
the data provided in the document. If any information is not mentioned in the CV, write \
'Unknown'. Do not invent values.\n\n{body}\n",
        body = template.body
    )
}
