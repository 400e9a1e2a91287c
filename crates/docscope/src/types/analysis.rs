//! Outputs of the analysis collaborators

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::ReportFormat;

/// Clarifying questions raised about the requirements
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Ambiguities {
    #[serde(default)]
    pub questions: Vec<String>,
}

impl Ambiguities {
    pub fn new(questions: Vec<String>) -> Self {
        Self { questions }
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Reference to a rendered report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportArtifact {
    pub document_id: String,
    pub path: PathBuf,
    pub format: ReportFormat,
}

/// Everything a completed job hands back
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub document_id: String,
    pub requirements: Value,
    pub ambiguities: Ambiguities,
    pub tech_stack: Value,
    pub report: ReportArtifact,
}
