//! External collaborators: image captioning, requirement analysis, report rendering

pub mod analysis;
pub mod ollama;
pub mod prompt;
pub mod report;
pub mod vision;

pub use analysis::{ambiguities_from_value, parse_json_response, AnalysisProvider};
pub use ollama::{OllamaAnalyst, OllamaClient, OllamaVision};
pub use prompt::PromptBuilder;
pub use report::{FileReportRenderer, ReportInput, ReportRenderer};
pub use vision::ImageSummarizer;
