//! Extension-dispatched document parser

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::assets::AssetStore;
use super::pdf::PdfOptions;
use super::table_detect::{LayoutTableDetector, TableDetector};
use super::{docx, pdf, pptx, spreadsheet, text};
use crate::config::IngestionConfig;
use crate::error::{Error, Result};
use crate::types::{DocumentContext, DocumentFormat, ExtractionResult};

/// Turns a document on disk into ordered content blocks
#[derive(Clone)]
pub struct DocumentParser {
    assets: AssetStore,
    table_detector: Option<Arc<dyn TableDetector>>,
    pdf_timeout: Duration,
}

impl DocumentParser {
    /// Parser with the layout table detector and a 60s PDF watchdog
    pub fn new(assets: AssetStore) -> Self {
        Self {
            assets,
            table_detector: Some(Arc::new(LayoutTableDetector::default())),
            pdf_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        let parser = Self::new(AssetStore::new(&config.work_dir))
            .with_pdf_timeout(Duration::from_secs(config.pdf_timeout_secs.max(1)));
        if config.detect_tables {
            parser
        } else {
            parser.with_table_detector(None)
        }
    }

    /// Replace the PDF table detector; `None` disables detection
    pub fn with_table_detector(mut self, detector: Option<Arc<dyn TableDetector>>) -> Self {
        self.table_detector = detector;
        self
    }

    pub fn with_pdf_timeout(mut self, timeout: Duration) -> Self {
        self.pdf_timeout = timeout;
        self
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Parse the file at `path`.
    ///
    /// A missing path is `NotFound`; the format is chosen from the extension
    /// alone, before any content is read.
    pub fn parse(&self, path: &Path, ctx: &DocumentContext) -> Result<ExtractionResult> {
        if !path.is_file() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e.to_lowercase()))
                .unwrap_or_else(|| "(no extension)".to_string());
            Error::UnsupportedFormat(ext)
        })?;

        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.parse_bytes(&filename, format, &data, ctx)
    }

    /// Parse in-memory content of a known format
    pub fn parse_bytes(
        &self,
        filename: &str,
        format: DocumentFormat,
        data: &[u8],
        ctx: &DocumentContext,
    ) -> Result<ExtractionResult> {
        let started = std::time::Instant::now();
        let mut scope = self.assets.scope(ctx);

        let result = match format {
            DocumentFormat::Docx => docx::extract(data, filename, &mut scope),
            DocumentFormat::Pdf => pdf::extract(
                data,
                filename,
                &mut scope,
                &PdfOptions {
                    timeout: self.pdf_timeout,
                    table_detector: self.table_detector.as_deref(),
                },
            ),
            DocumentFormat::Pptx => pptx::extract(data, filename, &mut scope),
            DocumentFormat::Xlsx => spreadsheet::extract(data, filename),
            DocumentFormat::Csv => text::extract_csv(data, filename),
            DocumentFormat::Txt => text::extract_txt(data),
        }?;

        tracing::info!(
            file = %filename,
            format = format.display_name(),
            document_id = %ctx.document_id,
            blocks = result.len(),
            images = result.image_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extracted document"
        );

        Ok(result)
    }
}
