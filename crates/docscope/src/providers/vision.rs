//! Image summarization provider trait

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// Produces a caption for a stored image
///
/// Implementations:
/// - `OllamaVision`: multimodal model on a local Ollama server
#[async_trait]
pub trait ImageSummarizer: Send + Sync {
    /// Describe the image at `path`. Called once per image; never retried.
    async fn summarize_image(&self, path: &Path) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
