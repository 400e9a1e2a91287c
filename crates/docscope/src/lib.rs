//! docscope: document ingestion and staged requirement analysis
//!
//! Uploaded documents (DOCX, PDF, PPTX, XLSX, CSV, TXT) are normalized into an
//! ordered stream of [`ContentBlock`]s, image blocks are captioned, and the
//! combined corpus is driven through a five-stage analysis pipeline whose
//! progress is exposed through an in-memory job store.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod types;

pub use config::DocscopeConfig;
pub use error::{Error, Result};
pub use types::{
    analysis::{AnalysisResult, Ambiguities, ReportArtifact},
    content::{ContentBlock, ExtractionResult},
    document::{DocumentContext, DocumentFormat},
    job::{JobStatus, PipelineJob, PipelineStage},
};
