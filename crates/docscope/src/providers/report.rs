//! Report rendering for completed analyses

use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::{ReportConfig, ReportFormat};
use crate::error::{Error, Result};
use crate::types::document::path_component;
use crate::types::{Ambiguities, ReportArtifact};

/// Inputs to a report, borrowed from the pipeline state
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub document_id: &'a str,
    pub requirements: &'a Value,
    pub ambiguities: &'a Ambiguities,
    pub tech_stack: &'a Value,
}

/// Produces a report artifact from the analysis outputs
///
/// Implementations:
/// - `FileReportRenderer`: Markdown or HTML file on local disk
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, input: &ReportInput<'_>) -> Result<ReportArtifact>;

    /// Get renderer name for logging
    fn name(&self) -> &str;
}

/// Writes one report file per document into an output directory
pub struct FileReportRenderer {
    output_dir: PathBuf,
    format: ReportFormat,
}

impl FileReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.output_dir.clone(), config.format)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn report_path(&self, document_id: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            path_component(document_id),
            self.format.extension()
        ))
    }
}

#[async_trait]
impl ReportRenderer for FileReportRenderer {
    async fn render(&self, input: &ReportInput<'_>) -> Result<ReportArtifact> {
        let markdown = render_markdown(input);
        let body = match self.format {
            ReportFormat::Markdown => markdown,
            ReportFormat::Html => markdown_to_html(&markdown),
        };

        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            Error::collaborator(format!(
                "Failed to create report directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let path = self.report_path(input.document_id);
        tokio::fs::write(&path, body).await.map_err(|e| {
            Error::collaborator(format!("Failed to write report {}: {}", path.display(), e))
        })?;

        tracing::info!(
            document_id = %input.document_id,
            path = %path.display(),
            "Report written"
        );

        Ok(ReportArtifact {
            document_id: input.document_id.to_string(),
            path,
            format: self.format,
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Build the Markdown report body
pub fn render_markdown(input: &ReportInput<'_>) -> String {
    let title = input
        .requirements
        .get("Title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Project Analysis");

    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", title);
    let _ = writeln!(out, "Document: `{}`\n", input.document_id);

    out.push_str("## Project Definition\n\n");
    let definition = strip_keys(input.requirements, &["Title", "ambiguities"]);
    write_value(&mut out, &definition, 0);
    out.push('\n');

    out.push_str("## Technology Stack\n\n");
    write_value(&mut out, input.tech_stack, 0);
    out.push('\n');

    out.push_str("## Risk Analysis\n\n");
    match input.requirements.get("ambiguities") {
        Some(risks) if !is_blank(risks) => write_value(&mut out, risks, 0),
        _ => out.push_str("No risks identified.\n"),
    }
    out.push('\n');

    out.push_str("## Open Questions\n\n");
    if input.ambiguities.is_empty() {
        out.push_str("No open questions.\n");
    } else {
        for (i, question) in input.ambiguities.questions.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, question);
        }
    }

    out
}

/// Convert Markdown to a standalone HTML page
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES);
    let mut body = String::new();
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Analysis Report</title></head>\n<body>\n{}</body>\n</html>\n",
        body
    )
}

fn strip_keys(value: &Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => map.values().all(is_blank),
        _ => false,
    }
}

/// Render a JSON value as nested Markdown bullets
fn write_value(out: &mut String, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if is_blank(v) {
                    continue;
                }
                match v {
                    Value::Object(_) | Value::Array(_) => {
                        let _ = writeln!(out, "{}- **{}**", indent, humanize(key));
                        write_value(out, v, depth + 1);
                    }
                    scalar => {
                        let _ = writeln!(
                            out,
                            "{}- **{}**: {}",
                            indent,
                            humanize(key),
                            scalar_text(scalar)
                        );
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter().filter(|i| !is_blank(i)) {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        let _ = writeln!(out, "{}-", indent);
                        write_value(out, item, depth + 1);
                    }
                    scalar => {
                        let _ = writeln!(out, "{}- {}", indent, scalar_text(scalar));
                    }
                }
            }
        }
        Value::Null => {}
        scalar => {
            let _ = writeln!(out, "{}{}", indent, scalar_text(scalar));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        other => other.to_string(),
    }
}

/// `project_scope` -> `Project Scope`
fn humanize(key: &str) -> String {
    key.split(|c: char| c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> (Value, Ambiguities, Value) {
        let requirements = json!({
            "Title": "Ticketing Portal",
            "project_statement": "Self-service ticketing for support",
            "project_requirements": ["SSO login", "Email notifications"],
            "ambiguities": {
                "product_development": ["No SLA targets"],
                "system_architecture": []
            }
        });
        let ambiguities = Ambiguities::new(vec![
            "Which identity provider?".to_string(),
            "Expected ticket volume?".to_string(),
        ]);
        let tech_stack = json!({
            "primary_stack": {"cloud": ["AWS Lambda"], "on_prem": ["Kubernetes"]},
            "alternatives": [{"type": "cloud", "tech": ["GCP"], "cost_savings": "10%"}]
        });
        (requirements, ambiguities, tech_stack)
    }

    #[test]
    fn test_markdown_sections() {
        let (requirements, ambiguities, tech_stack) = sample();
        let input = ReportInput {
            document_id: "doc-1",
            requirements: &requirements,
            ambiguities: &ambiguities,
            tech_stack: &tech_stack,
        };
        let md = render_markdown(&input);

        assert!(md.starts_with("# Ticketing Portal"));
        let order: Vec<usize> = [
            "## Project Definition",
            "## Technology Stack",
            "## Risk Analysis",
            "## Open Questions",
        ]
        .iter()
        .map(|h| md.find(h).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));

        assert!(md.contains("- **Project Statement**: Self-service ticketing"));
        assert!(md.contains("  - SSO login"));
        assert!(md.contains("No SLA targets"));
        assert!(!md.contains("System Architecture"));
        assert!(md.contains("1. Which identity provider?"));
        assert!(md.contains("2. Expected ticket volume?"));
    }

    #[test]
    fn test_markdown_defaults_for_empty_inputs() {
        let requirements = json!({});
        let ambiguities = Ambiguities::default();
        let tech_stack = json!({});
        let md = render_markdown(&ReportInput {
            document_id: "doc-2",
            requirements: &requirements,
            ambiguities: &ambiguities,
            tech_stack: &tech_stack,
        });
        assert!(md.starts_with("# Project Analysis"));
        assert!(md.contains("No risks identified."));
        assert!(md.contains("No open questions."));
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("project_scope"), "Project Scope");
        assert_eq!(humanize("on_prem"), "On Prem");
        assert_eq!(humanize("Title"), "Title");
    }

    #[tokio::test]
    async fn test_file_renderer_writes_html() {
        let dir = TempDir::new().unwrap();
        let renderer = FileReportRenderer::new(dir.path().join("reports"), ReportFormat::Html);
        let (requirements, ambiguities, tech_stack) = sample();

        let artifact = renderer
            .render(&ReportInput {
                document_id: "user/doc 1",
                requirements: &requirements,
                ambiguities: &ambiguities,
                tech_stack: &tech_stack,
            })
            .await
            .unwrap();

        assert_eq!(artifact.format, ReportFormat::Html);
        assert_eq!(artifact.path.parent().unwrap(), dir.path().join("reports"));
        assert_eq!(artifact.path.extension().unwrap(), "html");

        let body = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(body.contains("<h2>Open Questions</h2>"));
        assert!(body.contains("<li>Which identity provider?</li>"));
    }

    #[tokio::test]
    async fn test_unwritable_output_is_collaborator_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let renderer = FileReportRenderer::new(blocker.join("reports"), ReportFormat::Markdown);
        let (requirements, ambiguities, tech_stack) = sample();
        let result = renderer
            .render(&ReportInput {
                document_id: "doc",
                requirements: &requirements,
                ambiguities: &ambiguities,
                tech_stack: &tech_stack,
            })
            .await;
        assert!(matches!(result, Err(Error::Collaborator(_))));
    }
}
