//! Job Extractor — turns a normalized careers-page document into structured job postings.
//!
//! One model call per document, at most one parse attempt. The model output is validated
//! against a strict schema; anything else is an `ExtractionParse` error carrying the raw text.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::PipelineError;
use crate::generation::prompts::EXTRACT_JOBS_PROMPT_TEMPLATE;
use crate::llm_client::{strip_json_fences, TextGenerator};

/// One job posting extracted from a page. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    /// Required and non-null.
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub experience: String,
    /// Missing or null means no listed skills.
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Extracts job postings from a normalized document using the model.
///
/// Always returns a sequence: a single JSON object from the model becomes one posting.
/// An empty sequence is a valid "no postings" outcome.
pub async fn extract_jobs(
    document: &str,
    llm: &dyn TextGenerator,
) -> Result<Vec<JobPosting>, PipelineError> {
    let prompt = EXTRACT_JOBS_PROMPT_TEMPLATE.replace("{page_data}", document);
    let raw = llm
        .generate(&prompt)
        .await
        .map_err(PipelineError::Extraction)?;
    parse_job_postings(&raw)
}

/// Parses raw model output into postings: strip fences, parse JSON, validate each element.
pub fn parse_job_postings(raw: &str) -> Result<Vec<JobPosting>, PipelineError> {
    let cleaned = strip_json_fences(raw);

    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| parse_error(e.to_string(), raw))?;

    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(parse_error(
                format!("expected a JSON array or object, got {}", json_kind(&other)),
                raw,
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<JobPosting>(item)
                .map_err(|e| parse_error(format!("posting #{}: {e}", i + 1), raw))
        })
        .collect()
}

fn parse_error(message: String, raw: &str) -> PipelineError {
    PipelineError::ExtractionParse {
        message,
        raw_output: raw.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
