//! Document formats and per-document identity

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Supported container formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Microsoft Word document (.docx)
    Docx,
    /// PDF document
    Pdf,
    /// Microsoft PowerPoint presentation (.pptx)
    Pptx,
    /// Excel spreadsheet (.xlsx)
    Xlsx,
    /// Comma-separated values
    Csv,
    /// Plain text file
    Txt,
}

impl DocumentFormat {
    /// Detect format from an extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            "pptx" => Some(Self::Pptx),
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            "txt" | "text" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Detect format from a path's extension; `None` without one
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Docx => "Word Document (.docx)",
            Self::Pdf => "PDF",
            Self::Pptx => "PowerPoint (.pptx)",
            Self::Xlsx => "Excel Spreadsheet (.xlsx)",
            Self::Csv => "CSV",
            Self::Txt => "Text File",
        }
    }
}

/// Identity a document is extracted under.
///
/// Only used to namespace extracted assets and staged uploads, so that
/// concurrent jobs never write to the same place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentContext {
    pub document_id: String,
    pub user_id: String,
}

impl DocumentContext {
    pub fn new(document_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Mint a context with a fresh document id
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().simple().to_string(), user_id)
    }
}

/// Reduce an identifier to a single safe path component
pub fn path_component(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("DOCX"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("text"), Some(DocumentFormat::Txt));
        assert_eq!(DocumentFormat::from_extension("zip"), None);
        assert_eq!(DocumentFormat::from_extension("doc"), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("/tmp/Report.XLSX")),
            Some(DocumentFormat::Xlsx)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("/tmp/README")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("/tmp/report.xyz")), None);
    }

    #[test]
    fn test_path_component_sanitizes() {
        assert_eq!(path_component("user-42"), "user-42");
        assert_eq!(path_component("../../etc"), "______etc");
        assert_eq!(path_component(""), "_");
    }
}
