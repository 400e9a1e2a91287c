//! Word (.docx) extraction
//!
//! Walks `word/document.xml` in body order. Consecutive non-empty paragraphs
//! coalesce into one text block; an image or a table closes the current run.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use super::assets::AssetScope;
use super::ooxml::{attribute, Package};
use crate::error::{Error, Result};
use crate::types::{ContentBlock, DocumentFormat, ExtractionResult};

const DOCUMENT_PART: &str = "word/document.xml";

pub(crate) fn extract(
    data: &[u8],
    filename: &str,
    scope: &mut AssetScope,
) -> Result<ExtractionResult> {
    let mut package = Package::open(data, filename)?;
    let xml = package
        .read_xml(DOCUMENT_PART)?
        .ok_or_else(|| Error::malformed(filename, format!("missing {}", DOCUMENT_PART)))?;
    let rels = package.relationships(DOCUMENT_PART)?;

    let mut walker = BodyWalker::new(&mut package, &rels, scope);
    walker.walk(&xml)?;
    Ok(walker.finish())
}

/// Table being collected; only the outermost table becomes a block
#[derive(Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
    images: Vec<String>,
}

struct BodyWalker<'p, 'a> {
    package: &'p mut Package<'a>,
    rels: &'p HashMap<String, String>,
    scope: &'p mut AssetScope,
    result: ExtractionResult,
    /// Paragraphs of the open text run
    run_lines: Vec<String>,
    paragraph: String,
    paragraph_depth: usize,
    table_depth: usize,
    table: TableState,
    in_run: bool,
    in_text: bool,
    /// Inside `mc:Fallback`, which duplicates its `mc:Choice` sibling
    fallback_depth: usize,
}

impl<'p, 'a> BodyWalker<'p, 'a> {
    fn new(
        package: &'p mut Package<'a>,
        rels: &'p HashMap<String, String>,
        scope: &'p mut AssetScope,
    ) -> Self {
        Self {
            package,
            rels,
            scope,
            result: ExtractionResult::new(DocumentFormat::Docx),
            run_lines: Vec::new(),
            paragraph: String::new(),
            paragraph_depth: 0,
            table_depth: 0,
            table: TableState::default(),
            in_run: false,
            in_text: false,
            fallback_depth: 0,
        }
    }

    fn walk(&mut self, xml: &str) -> Result<()> {
        let mut reader = Reader::from_str(xml);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if e.local_name().as_ref() == b"Fallback" {
                        self.fallback_depth += 1;
                    } else if self.fallback_depth == 0 {
                        self.start(&e)?;
                    }
                }
                Ok(Event::Empty(e)) => {
                    if self.fallback_depth == 0 {
                        self.empty(&e)?;
                    }
                }
                Ok(Event::Text(e)) => {
                    if self.in_text && self.fallback_depth == 0 {
                        let text = e
                            .unescape()
                            .map_err(|err| {
                                Error::malformed(self.package.filename(), err.to_string())
                            })?;
                        self.push_text(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if self.in_text && self.fallback_depth == 0 {
                        self.push_text(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::End(e)) => {
                    let name = e.local_name();
                    if name.as_ref() == b"Fallback" {
                        self.fallback_depth = self.fallback_depth.saturating_sub(1);
                    } else if self.fallback_depth == 0 {
                        self.end(name.as_ref())?;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::malformed(
                        self.package.filename(),
                        format!("{}: {}", DOCUMENT_PART, e),
                    ))
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"p" => self.paragraph_depth += 1,
            b"r" => self.in_run = true,
            b"t" if self.in_run => self.in_text = true,
            b"tbl" => {
                if self.table_depth == 0 {
                    self.flush_run();
                    self.table = TableState::default();
                }
                self.table_depth += 1;
            }
            b"tr" if self.table_depth == 1 => self.table.row.clear(),
            b"tc" if self.table_depth == 1 => self.table.cell.clear(),
            _ => self.empty(e)?,
        }
        Ok(())
    }

    /// Self-closing elements, plus the start of image elements
    fn empty(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"tab" if self.in_run => self.push_text("\t"),
            b"br" | b"cr" if self.in_run => self.push_text("\n"),
            b"blip" => {
                if let Some(id) = attribute(e, b"embed") {
                    self.image(&id)?;
                }
            }
            b"imagedata" => {
                if let Some(id) = attribute(e, b"id") {
                    self.image(&id)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<()> {
        match name {
            b"t" => self.in_text = false,
            b"r" => self.in_run = false,
            b"p" => {
                self.paragraph_depth = self.paragraph_depth.saturating_sub(1);
                if self.paragraph_depth == 0 {
                    self.close_paragraph();
                } else {
                    self.push_text("\n");
                }
            }
            b"tc" if self.table_depth == 1 => {
                let cell = collapse_whitespace(&self.table.cell);
                self.table.row.push(cell);
            }
            b"tr" if self.table_depth == 1 => {
                let row = std::mem::take(&mut self.table.row);
                self.table.rows.push(row);
            }
            b"tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                if self.table_depth == 0 {
                    self.close_table()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        if self.table_depth > 0 {
            self.table.cell.push_str(text);
        } else {
            self.paragraph.push_str(text);
        }
    }

    fn close_paragraph(&mut self) {
        if self.table_depth > 0 {
            self.table.cell.push(' ');
            return;
        }
        let text = std::mem::take(&mut self.paragraph);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.run_lines.push(trimmed.to_string());
        }
    }

    fn flush_run(&mut self) {
        let trimmed = self.paragraph.trim();
        if !trimmed.is_empty() {
            self.run_lines.push(trimmed.to_string());
        }
        self.paragraph.clear();

        if !self.run_lines.is_empty() {
            let text = std::mem::take(&mut self.run_lines).join("\n");
            self.result.push(ContentBlock::text(text));
        }
    }

    fn image(&mut self, rel_id: &str) -> Result<()> {
        if self.table_depth > 0 {
            // Emitted right after the enclosing table
            self.table.images.push(rel_id.to_string());
            return Ok(());
        }
        if let Some(block) = self.package.embedded_image(self.rels, rel_id, self.scope)? {
            self.flush_run();
            self.result.push(block);
        }
        Ok(())
    }

    fn close_table(&mut self) -> Result<()> {
        let table = std::mem::take(&mut self.table);
        if !table.rows.is_empty() {
            self.result.push(ContentBlock::table(table.rows));
        }
        for rel_id in table.images {
            if let Some(block) = self.package.embedded_image(self.rels, &rel_id, self.scope)? {
                self.result.push(block);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> ExtractionResult {
        self.flush_run();
        self.result
    }
}

/// Trim and fold internal whitespace runs to single spaces
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
