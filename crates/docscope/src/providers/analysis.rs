//! Requirements analysis provider trait and response parsing

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::Ambiguities;

/// The three corpus-level analysis calls
///
/// Implementations:
/// - `OllamaAnalyst`: JSON-mode generation on a local Ollama server
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Structured requirements extracted from the combined corpus
    async fn analyze_requirements(&self, corpus: &str) -> Result<Value>;

    /// Clarifying questions about the requirements
    async fn identify_ambiguities(&self, requirements: &Value) -> Result<Ambiguities>;

    /// Technology stack recommendation for the requirements
    async fn recommend_tech_stack(&self, requirements: &Value) -> Result<Value>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Parse a model response as JSON, tolerating Markdown code fences and
/// prose around a single top-level object
pub fn parse_json_response(raw: &str) -> Result<Value> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&cleaned[start..=end]) {
                return Ok(value);
            }
        }
    }

    let preview: String = cleaned.chars().take(200).collect();
    Err(Error::collaborator(format!(
        "Model returned unparseable JSON: {}",
        preview
    )))
}

/// Read `{"questions": [...]}`; non-string entries are rendered as JSON text
pub fn ambiguities_from_value(value: &Value) -> Result<Ambiguities> {
    let questions = value
        .get("questions")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::collaborator("Ambiguity response has no \"questions\" list"))?;

    let questions = questions
        .iter()
        .map(|q| match q {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .filter(|q| !q.is_empty())
        .collect();

    Ok(Ambiguities::new(questions))
}
