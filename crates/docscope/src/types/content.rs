//! Normalized content blocks produced by the format extractors

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::document::DocumentFormat;

/// Separator between table cells when a table is flattened to text
const CELL_SEPARATOR: &str = " | ";

/// One unit of extracted content, in source order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Running text
    Text { data: String },
    /// A persisted raster image, optionally captioned
    Image {
        path: PathBuf,
        caption: Option<String>,
    },
    /// Row-major cell text; `name` carries the worksheet name for spreadsheets
    Table {
        rows: Vec<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(data: impl Into<String>) -> Self {
        Self::Text { data: data.into() }
    }

    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self::Image {
            path: path.into(),
            caption: None,
        }
    }

    pub fn table(rows: Vec<Vec<String>>) -> Self {
        Self::Table { rows, name: None }
    }

    pub fn named_table(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self::Table {
            rows,
            name: Some(name.into()),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Attach a caption to an uncaptioned image block.
    ///
    /// Returns `false` (and leaves the block untouched) for non-image blocks,
    /// already-captioned images, and blank captions.
    pub fn set_caption(&mut self, text: impl Into<String>) -> bool {
        match self {
            Self::Image { caption, .. } if caption.is_none() => {
                let text = text.into();
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return false;
                }
                *caption = Some(trimmed.to_string());
                true
            }
            _ => false,
        }
    }

    /// Text this block contributes to the combined corpus
    pub fn corpus_text(&self) -> String {
        match self {
            Self::Text { data } => data.clone(),
            Self::Image { caption, .. } => caption.clone().unwrap_or_default(),
            Self::Table { rows, name } => {
                let mut lines = Vec::with_capacity(rows.len() + 1);
                if let Some(name) = name {
                    lines.push(format!("Sheet: {}", name));
                }
                lines.extend(rows.iter().map(|row| row.join(CELL_SEPARATOR)));
                lines.join("\n")
            }
        }
    }
}

/// Ordered content blocks of one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Format of the source file, when the result covers a single file
    pub format: Option<DocumentFormat>,
    blocks: Vec<ContentBlock>,
}

impl ExtractionResult {
    pub fn new(format: DocumentFormat) -> Self {
        Self {
            format: Some(format),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: ContentBlock) {
        self.blocks.push(block);
    }

    /// Append another document's blocks after this one's
    pub fn extend(&mut self, other: ExtractionResult) {
        if self.format != other.format {
            self.format = None;
        }
        self.blocks.extend(other.blocks);
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<ContentBlock> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Image blocks in order, for in-place captioning
    pub fn images_mut(&mut self) -> impl Iterator<Item = &mut ContentBlock> {
        self.blocks.iter_mut().filter(|b| b.is_image())
    }

    /// Paths of image blocks in order
    pub fn image_paths(&self) -> Vec<&Path> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Image { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_image()).count()
    }

    /// Flatten all blocks, in order, into one newline-joined corpus.
    ///
    /// Uncaptioned images contribute an empty line so that block positions
    /// stay aligned with the source.
    pub fn combine(&self) -> String {
        self.blocks
            .iter()
            .map(ContentBlock::corpus_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtractionResult {
        let mut result = ExtractionResult::new(DocumentFormat::Docx);
        result.push(ContentBlock::text("Intro paragraph"));
        result.push(ContentBlock::image("/tmp/a.png"));
        result.push(ContentBlock::table(vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["1".to_string(), "2".to_string()],
        ]));
        result
    }

    #[test]
    fn test_combine_preserves_order() {
        let result = sample();
        assert_eq!(result.combine(), "Intro paragraph\n\na | b\n1 | 2");
    }

    #[test]
    fn test_combine_includes_captions() {
        let mut result = sample();
        for image in result.images_mut() {
            assert!(image.set_caption("  An architecture diagram "));
        }
        assert_eq!(
            result.combine(),
            "Intro paragraph\nAn architecture diagram\na | b\n1 | 2"
        );
    }

    #[test]
    fn test_caption_set_once() {
        let mut block = ContentBlock::image("/tmp/x.png");
        assert!(block.set_caption("first"));
        assert!(!block.set_caption("second"));
        assert_eq!(
            block,
            ContentBlock::Image {
                path: PathBuf::from("/tmp/x.png"),
                caption: Some("first".to_string()),
            }
        );
    }

    #[test]
    fn test_blank_caption_ignored() {
        let mut block = ContentBlock::image("/tmp/x.png");
        assert!(!block.set_caption("   "));
        assert!(!ContentBlock::text("hi").set_caption("nope"));
        assert_eq!(block.corpus_text(), "");
    }

    #[test]
    fn test_named_table_corpus() {
        let block =
            ContentBlock::named_table("Budget", vec![vec!["Q1".to_string(), "".to_string()]]);
        assert_eq!(block.corpus_text(), "Sheet: Budget\nQ1 | ");
    }

    #[test]
    fn test_empty_result_combines_to_empty_corpus() {
        let result = ExtractionResult::default();
        assert!(result.is_empty());
        assert_eq!(result.combine(), "");
    }

    #[test]
    fn test_block_serialization_is_tagged() {
        let json = serde_json::to_value(ContentBlock::text("x")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["data"], "x");
    }
}
