//! Prompt templates for the analysis and captioning calls

use serde_json::Value;

/// Upper bound on corpus characters sent to the model
const MAX_CORPUS_CHARS: usize = 60_000;

/// Prompt builder for the analysis pipeline
pub struct PromptBuilder;

impl PromptBuilder {
    /// Requirements extraction over the combined document corpus
    pub fn requirements_prompt(corpus: &str) -> String {
        format!(
            r#"You are a presales engineer reviewing a document that describes a system to be built.

Extract the project requirements and return ONLY a JSON object with these keys:
- "Title": a short professional title, under 7 words
- "is_technical_document": true if the document proposes a new system or product to build, else false
- "document_analysis": one sentence classifying the document
- "project_statement": the core technical objective
- "project_scope": the scope of the project
- "project_requirements": list of key functional and technical needs
- "technologies_provided": list of technologies the document mentions
- "team_roles": list of teams or roles the document mentions
- "high_level_flow": the system workflow, if described
- "ambiguities": object with "product_development" and "system_architecture" lists of missing details

Use empty strings or lists where the document says nothing.

DOCUMENT:
{document}

Return ONLY valid JSON:"#,
            document = Self::truncate(corpus)
        )
    }

    /// Follow-up questions about the extracted requirements
    pub fn ambiguities_prompt(requirements: &Value) -> String {
        format!(
            r#"Identify ambiguities and technical challenges in these project requirements:
{requirements}

Generate follow-up questions that would resolve them.
Return ONLY JSON in the form {{"questions": ["question1", "question2"]}}"#,
            requirements = requirements
        )
    }

    /// Technology stack recommendation for the extracted requirements
    pub fn tech_stack_prompt(requirements: &Value) -> String {
        format!(
            r#"Based on these project requirements:
{requirements}

Recommend:
1. A primary technology stack with cloud and on-premises options
2. Alternatives with cost comparisons

Return ONLY JSON in this form:
{{
  "primary_stack": {{
    "cloud": ["tech"],
    "on_prem": ["tech"],
    "cost_efficient_technologies": ["tech"],
    "developers_required": ["role"]
  }},
  "alternatives": [
    {{"type": "cloud", "tech": ["tech"], "cost_savings": "estimate"}}
  ]
}}"#,
            requirements = requirements
        )
    }

    /// Image description for the captioning model
    pub fn caption_prompt() -> &'static str {
        "You are a technical expert. Describe this image comprehensively. \
         If it is a software architecture diagram, explain its components, connections, \
         data flows and technologies. Include text labels, symbols and overall structure."
    }

    fn truncate(corpus: &str) -> &str {
        match corpus.char_indices().nth(MAX_CORPUS_CHARS) {
            Some((idx, _)) => {
                tracing::warn!(
                    chars = corpus.chars().count(),
                    limit = MAX_CORPUS_CHARS,
                    "Corpus truncated for analysis prompt"
                );
                &corpus[..idx]
            }
            None => corpus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requirements_prompt_embeds_corpus() {
        let prompt = PromptBuilder::requirements_prompt("Build a ticketing portal");
        assert!(prompt.contains("Build a ticketing portal"));
        assert!(prompt.ends_with("Return ONLY valid JSON:"));
    }

    #[test]
    fn test_followup_prompts_embed_requirements() {
        let requirements = json!({"project_statement": "Ticketing portal"});
        assert!(PromptBuilder::ambiguities_prompt(&requirements).contains("Ticketing portal"));
        assert!(PromptBuilder::tech_stack_prompt(&requirements).contains("primary_stack"));
    }

    #[test]
    fn test_long_corpus_truncated() {
        let corpus = "x".repeat(MAX_CORPUS_CHARS + 10);
        assert_eq!(PromptBuilder::truncate(&corpus).len(), MAX_CORPUS_CHARS);
    }
}
