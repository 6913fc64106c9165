//! The extraction target: schema template and structured record.
//!
//! [`SchemaTemplate`] is the one piece of wire format shared with the
//! completion model. Its body is embedded verbatim in the prompt, so field
//! names here, in the template text and in [`StructuredRecord`]'s serde
//! names must stay identical.
//!
//! Every scalar field holds either an extracted value or the sentinel
//! [`UNKNOWN`]; never `null`. Deserialisation is lenient about scalar types
//! (numbers become strings, `null`/missing become [`UNKNOWN`]) because the
//! record's shape is what matters to downstream consumers, not how the model
//! chose to spell a phone number.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker for a field that is not present in the source document.
pub const UNKNOWN: &str = "Unknown";

/// JSON kind a top-level template field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Object,
    Array,
}

impl FieldKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }
}

/// Fixed, versioned description of the record the model must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaTemplate {
    pub version: &'static str,
    /// Annotated JSON skeleton embedded in the prompt.
    pub body: &'static str,
    /// Top-level fields a response must contain, with their kinds.
    pub fields: &'static [(&'static str, FieldKind)],
}

impl SchemaTemplate {
    /// The résumé template.
    pub const fn resume() -> Self {
        Self {
            version: "resume/1",
            body: RESUME_TEMPLATE,
            fields: &[
                ("basic_info", FieldKind::Object),
                ("work_experience", FieldKind::Array),
                ("education", FieldKind::Array),
                ("languages", FieldKind::Array),
                ("skills", FieldKind::Array),
                ("certification", FieldKind::Array),
            ],
        }
    }

    /// Check that `value` has this template's top-level shape.
    ///
    /// Returns a description of the first mismatch.
    pub fn check_shape(&self, value: &Value) -> Result<(), String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", json_kind(value)))?;
        for (name, kind) in self.fields {
            match obj.get(*name) {
                None => return Err(format!("missing top-level field '{name}'")),
                Some(v) if !kind.matches(v) => {
                    return Err(format!(
                        "field '{name}' must be an {}, got {}",
                        kind.as_str(),
                        json_kind(v)
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl Default for SchemaTemplate {
    fn default() -> Self {
        Self::resume()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

const RESUME_TEMPLATE: &str = r#"{
    "basic_info": {  // Basic Information about the candidate
        "name": "<string>",  // Full name of the candidate
        "email": "<string>",  // Email address of the candidate
        "phone_number": "<string>",  // Phone number of the candidate
        "location": "<string>"  // Location of the candidate
    },
    "work_experience": [  // Array of work experience objects
        {
        "job_title": "<string>",  // Job title of the work experience
        "company": "<string>",  // Company of the work experience
        "location": "<string>",  // Location of the work experience
        "start_date": "<string>",  // Start date of the work experience (please convert the date into %b %Y format)
        "end_date": "<string>",  // End date of the work experience (please convert the date into %b %Y format)
        "job_desc": ["<string>", ...]  // Array of job descriptions ex. ["job_desc 1", "job_desc 2"]
        }
    ],
    "education": [  // Array of education objects
        {
        "title": "<string>",  // Title of the education (e.g. Bachelor's degree)
        "institute": "<string>",  // Institute of the education
        "location": "<string>",  // Location of the institute
        "start_date": "<string>",  // Start date of the education (please convert the date into %b %Y format)
        "end_date": "<string>",  // End date of the education (please convert the date into %b %Y format)
        "description": "<string>"  // Description of the education
        }
    ],
    "languages": ["<string>", ...],  // Array of languages spoken by the candidate
    "skills": ["<string>", ...],  // Array of skills possessed by the candidate
    "certification": [  // Array of certification objects
        {
        "title": "<string>",  // Title of the certification
        "issuer": "<string>",  // Issuer of the certification
        "start_date": "<string>",  // Start date of the certification (please convert the date into %b %Y format)
        "expiration_date": "<string>"  // Expiration date of the certification (please convert the date into %b %Y format)
        }
    ]
}"#;

// ── Record types ─────────────────────────────────────────────────────────

/// The validated extraction result for one résumé.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub basic_info: BasicInfo,
    pub work_experience: Vec<WorkExperience>,
    pub education: Vec<Education>,
    #[serde(deserialize_with = "de_text_list")]
    pub languages: Vec<String>,
    #[serde(deserialize_with = "de_text_list")]
    pub skills: Vec<String>,
    pub certification: Vec<Certification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub name: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub email: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub phone_number: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub job_title: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub company: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub location: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub start_date: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub end_date: String,
    #[serde(default, deserialize_with = "de_text_list")]
    pub job_desc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub title: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub institute: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub location: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub start_date: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub end_date: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub title: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub issuer: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub start_date: String,
    #[serde(default = "unknown", deserialize_with = "de_text")]
    pub expiration_date: String,
}

impl StructuredRecord {
    /// Drop repeated language and skill names, keeping first occurrences.
    pub fn dedup_sets(&mut self) {
        dedup_in_order(&mut self.languages);
        dedup_in_order(&mut self.skills);
    }
}

/// Whether a field value is the [`UNKNOWN`] sentinel.
pub fn is_unknown(value: &str) -> bool {
    value == UNKNOWN
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

fn scalar_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => Some(unknown()),
        Value::String(s) if s.trim().is_empty() => Some(unknown()),
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let kind = json_kind(&value);
    scalar_to_text(value)
        .ok_or_else(|| de::Error::custom(format!("expected a text value, got {kind}")))
}

fn de_text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                let kind = json_kind(&item);
                scalar_to_text(item).ok_or_else(|| {
                    de::Error::custom(format!("expected a list of text values, found {kind}"))
                })
            })
            .collect(),
        other => scalar_to_text(other)
            .map(|s| vec![s])
            .ok_or_else(|| de::Error::custom("expected a list of text values")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_record_json() -> Value {
        json!({
            "basic_info": {
                "name": "john doe",
                "email": "john@gmail.com",
                "phone_number": "081234567890",
                "location": "jakarta"
            },
            "work_experience": [{
                "job_title": "data analyst",
                "company": "pt maju",
                "location": "Unknown",
                "start_date": "Jan 2020",
                "end_date": "Present",
                "job_desc": ["built dashboards", "automated reports"]
            }],
            "education": [{
                "title": "S1 Statistics",
                "institute": "universitas indonesia",
                "location": "depok",
                "start_date": "Aug 2014",
                "end_date": "Jul 2018",
                "description": "Unknown"
            }],
            "languages": ["indonesian", "english"],
            "skills": ["python", "sql"],
            "certification": []
        })
    }

    #[test]
    fn template_field_names_match_record() {
        let template = SchemaTemplate::resume();
        let record: StructuredRecord = serde_json::from_value(full_record_json()).unwrap();
        let serialized = serde_json::to_value(&record).unwrap();
        assert!(template.check_shape(&serialized).is_ok());
        for (name, _) in template.fields {
            assert!(template.body.contains(&format!("\"{name}\"")), "{name}");
        }
        for key in ["name", "email", "phone_number", "location"] {
            assert!(serialized["basic_info"].get(key).is_some());
        }
    }

    #[test]
    fn shape_check_reports_missing_field() {
        let mut value = full_record_json();
        value.as_object_mut().unwrap().remove("skills");
        let err = SchemaTemplate::resume().check_shape(&value).unwrap_err();
        assert!(err.contains("skills"), "{err}");
    }

    #[test]
    fn shape_check_reports_wrong_kind() {
        let mut value = full_record_json();
        value["education"] = json!("none");
        let err = SchemaTemplate::resume().check_shape(&value).unwrap_err();
        assert!(err.contains("education") && err.contains("array"), "{err}");

        let err = SchemaTemplate::resume().check_shape(&json!([1, 2])).unwrap_err();
        assert!(err.contains("object"), "{err}");
    }

    #[test]
    fn missing_and_null_scalars_become_unknown() {
        let record: StructuredRecord = serde_json::from_value(json!({
            "basic_info": {"name": "jane", "email": null, "phone_number": ""},
            "work_experience": [{"job_title": "engineer"}],
            "education": [],
            "languages": [],
            "skills": [],
            "certification": [{"title": "aws saa", "issuer": null}]
        }))
        .unwrap();
        assert_eq!(record.basic_info.name, "jane");
        assert!(is_unknown(&record.basic_info.email));
        assert!(is_unknown(&record.basic_info.phone_number));
        assert!(is_unknown(&record.basic_info.location));
        assert!(is_unknown(&record.work_experience[0].company));
        assert!(record.work_experience[0].job_desc.is_empty());
        assert!(is_unknown(&record.certification[0].issuer));
    }

    #[test]
    fn numeric_scalars_are_stringified() {
        let mut value = full_record_json();
        value["basic_info"]["phone_number"] = json!(81234567890u64);
        value["work_experience"][0]["job_desc"] = json!("single line description");
        let record: StructuredRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.basic_info.phone_number, "81234567890");
        assert_eq!(
            record.work_experience[0].job_desc,
            vec!["single line description".to_string()]
        );
    }

    #[test]
    fn nested_object_in_scalar_is_rejected() {
        let mut value = full_record_json();
        value["basic_info"]["name"] = json!({"first": "john"});
        assert!(serde_json::from_value::<StructuredRecord>(value).is_err());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut record: StructuredRecord = serde_json::from_value(full_record_json()).unwrap();
        record.skills = vec!["sql".into(), "python".into(), "sql".into()];
        record.dedup_sets();
        assert_eq!(record.skills, vec!["sql".to_string(), "python".to_string()]);
    }
}
