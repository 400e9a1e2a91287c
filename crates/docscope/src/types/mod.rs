//! Core types for extraction and pipeline jobs

pub mod analysis;
pub mod content;
pub mod document;
pub mod job;

pub use analysis::{AnalysisResult, Ambiguities, ReportArtifact};
pub use content::{ContentBlock, ExtractionResult};
pub use document::{DocumentContext, DocumentFormat};
pub use job::{JobStatus, PipelineJob, PipelineStage};
