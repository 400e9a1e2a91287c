//! Best-effort image captioning over an extraction result

use serde::Serialize;

use crate::providers::ImageSummarizer;
use crate::types::{ContentBlock, ExtractionResult};

/// Outcome counts for one annotation pass
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub total: usize,
    pub captioned: usize,
    pub failed: usize,
}

/// Caption every uncaptioned image block in place.
///
/// Each image gets exactly one summarizer call. A failed or empty caption
/// leaves the block uncaptioned and never fails the pass. `on_progress`
/// receives `(done, total)` after each image.
pub async fn annotate_images<F>(
    result: &mut ExtractionResult,
    summarizer: &dyn ImageSummarizer,
    mut on_progress: F,
) -> AnnotationSummary
where
    F: FnMut(usize, usize),
{
    let mut summary = AnnotationSummary {
        total: result
            .blocks()
            .iter()
            .filter(|b| matches!(b, ContentBlock::Image { caption: None, .. }))
            .count(),
        ..AnnotationSummary::default()
    };

    if summary.total == 0 {
        return summary;
    }

    tracing::info!(
        images = summary.total,
        summarizer = summarizer.name(),
        "Captioning images"
    );

    let mut done = 0;
    for block in result.images_mut() {
        let ContentBlock::Image { path, caption: None } = block else {
            continue;
        };
        let path = path.clone();

        match summarizer.summarize_image(&path).await {
            Ok(text) => {
                if block.set_caption(text) {
                    summary.captioned += 1;
                } else {
                    tracing::warn!(path = %path.display(), "Empty caption discarded");
                    summary.failed += 1;
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Image captioning failed");
                summary.failed += 1;
            }
        }

        done += 1;
        on_progress(done, summary.total);
    }

    tracing::info!(
        captioned = summary.captioned,
        failed = summary.failed,
        "Image captioning finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::types::DocumentFormat;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySummarizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageSummarizer for FlakySummarizer {
        async fn summarize_image(&self, path: &Path) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match path.file_stem().and_then(|s| s.to_str()) {
                Some("bad") => Err(Error::collaborator("model offline")),
                Some("blank") => Ok("   ".to_string()),
                Some(stem) => Ok(format!("A diagram of {}", stem)),
                None => Ok(String::new()),
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_failures_leave_images_uncaptioned() {
        let mut result = ExtractionResult::new(DocumentFormat::Docx);
        result.push(ContentBlock::text("intro"));
        result.push(ContentBlock::image("/assets/arch.png"));
        result.push(ContentBlock::image("/assets/bad.png"));
        result.push(ContentBlock::image("/assets/blank.png"));

        let summarizer = FlakySummarizer {
            calls: AtomicUsize::new(0),
        };
        let mut progress = Vec::new();
        let summary = annotate_images(&mut result, &summarizer, |done, total| {
            progress.push((done, total))
        })
        .await;

        assert_eq!(
            summary,
            AnnotationSummary {
                total: 3,
                captioned: 1,
                failed: 2
            }
        );
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

        let captions: Vec<Option<&str>> = result
            .blocks()
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Image { caption, .. } => Some(caption.as_deref()),
                _ => None,
            })
            .collect();
        assert_eq!(captions, vec![Some("A diagram of arch"), None, None]);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_no_images_no_calls() {
        let mut result = ExtractionResult::new(DocumentFormat::Txt);
        result.push(ContentBlock::text("only text"));
        let summarizer = FlakySummarizer {
            calls: AtomicUsize::new(0),
        };

        let summary =
            tokio_test::block_on(annotate_images(&mut result, &summarizer, |_, _| {}));
        assert_eq!(summary.total, 0);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }
}
