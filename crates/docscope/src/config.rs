//! Configuration for the docscope service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocscopeConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Ollama/LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Extraction configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Job execution and retention
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Report output
    #[serde(default)]
    pub report: ReportConfig,
}

impl DocscopeConfig {
    /// Load configuration from an optional TOML file, then apply
    /// `DOCSCOPE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw).map_err(|e| {
                    Error::Config(format!("Invalid config {}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DOCSCOPE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DOCSCOPE_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("DOCSCOPE_PORT is not a port: {}", port)))?;
        }
        if let Some(size) = lookup("DOCSCOPE_MAX_UPLOAD_SIZE") {
            self.server.max_upload_size = size.parse().map_err(|_| {
                Error::Config(format!("DOCSCOPE_MAX_UPLOAD_SIZE is not a size: {}", size))
            })?;
        }
        if let Some(url) = lookup("DOCSCOPE_OLLAMA_URL") {
            self.llm.base_url = url;
        }
        if let Some(dir) = lookup("DOCSCOPE_WORK_DIR") {
            self.ingestion.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DOCSCOPE_REPORT_DIR") {
            self.report.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.max_upload_size == 0 {
            return Err(Error::Config("server.max_upload_size must be positive".to_string()));
        }
        if self.jobs.max_concurrent == 0 {
            return Err(Error::Config("jobs.max_concurrent must be positive".to_string()));
        }
        if self.llm.analysis_model.trim().is_empty() || self.llm.vision_model.trim().is_empty() {
            return Err(Error::Config("llm model names must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Maximum total upload size per submission in bytes (default: 10MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_size: 10 * 1024 * 1024,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Model for the three analysis calls
    pub analysis_model: String,
    /// Multimodal model for image captioning
    pub vision_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for analysis calls; captioning is always a single attempt
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            analysis_model: "llama3.1:8b".to_string(),
            vision_model: "llava:7b".to_string(),
            temperature: 0.3,
            timeout_secs: 180,
            max_retries: 2,
        }
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Root for staged uploads and extracted image assets
    pub work_dir: PathBuf,
    /// Run the PDF table detection pass
    pub detect_tables: bool,
    /// Watchdog for the primary PDF text extractor
    pub pdf_timeout_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            work_dir: default_data_dir().join("work"),
            detect_tables: true,
            pdf_timeout_secs: 60,
        }
    }
}

/// Job execution and retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Pipeline runs allowed in flight at once
    pub max_concurrent: usize,
    /// Seconds a terminal job is kept before eviction (0 keeps forever)
    pub retention_secs: u64,
    /// Seconds between eviction sweeps
    pub sweep_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get().clamp(1, 4),
            retention_secs: 24 * 60 * 60,
            sweep_interval_secs: 300,
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Html,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
        }
    }
}

/// Report output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory reports are written to
    pub output_dir: PathBuf,
    /// Output format
    pub format: ReportFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_data_dir().join("reports"),
            format: ReportFormat::Markdown,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("docscope")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = DocscopeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.max_upload_size, 10 * 1024 * 1024);
        assert!(config.jobs.max_concurrent >= 1 && config.jobs.max_concurrent <= 4);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            max_upload_size = 1024

            [report]
            output_dir = "/tmp/reports"
            format = "html"
        "#;
        let config: DocscopeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.report.format, ReportFormat::Html);
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert!(config.ingestion.detect_tables);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DOCSCOPE_PORT", "7070"),
            ("DOCSCOPE_OLLAMA_URL", "http://ollama:11434"),
            ("DOCSCOPE_WORK_DIR", "/srv/docscope"),
        ]
        .into_iter()
        .collect();

        let mut config = DocscopeConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 7070);
        assert_eq!(config.llm.base_url, "http://ollama:11434");
        assert_eq!(config.ingestion.work_dir, PathBuf::from("/srv/docscope"));
    }

    #[test]
    fn test_invalid_env_port_rejected() {
        let mut config = DocscopeConfig::default();
        let result = config.apply_env(|key| (key == "DOCSCOPE_PORT").then(|| "nope".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = DocscopeConfig::default();
        config.jobs.max_concurrent = 0;
        assert!(config.validate().is_err());
    }
}
