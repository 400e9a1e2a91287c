//! PowerPoint (.pptx) extraction
//!
//! Per slide, in shape-tree order: one text block per shape with text, one
//! image block per picture, one table block per graphic-frame table.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use super::assets::AssetScope;
use super::ooxml::{attribute, Package};
use crate::error::{Error, Result};
use crate::types::{ContentBlock, DocumentFormat, ExtractionResult};

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const PRESENTATION_PART: &str = "ppt/presentation.xml";

pub(crate) fn extract(
    data: &[u8],
    filename: &str,
    scope: &mut AssetScope,
) -> Result<ExtractionResult> {
    let mut package = Package::open(data, filename)?;
    let mut result = ExtractionResult::new(DocumentFormat::Pptx);

    for slide in slide_order(&mut package)? {
        let Some(xml) = package.read_xml(&slide)? else {
            continue;
        };
        let rels = package.relationships(&slide)?;
        let before = result.len();
        SlideWalker {
            package: &mut package,
            rels: &rels,
            scope: &mut *scope,
            result: &mut result,
            state: SlideState::default(),
        }
        .walk(&slide, &xml)?;
        tracing::debug!(slide = %slide, blocks = result.len() - before, "Extracted slide");
    }

    Ok(result)
}

/// Slide parts in deck order.
///
/// The order comes from `p:sldIdLst` in the presentation part, since slide
/// part names are not renumbered when slides move. Packages without a
/// presentation part fall back to slide-number order.
fn slide_order(package: &mut Package<'_>) -> Result<Vec<String>> {
    let Some(xml) = package.read_xml(PRESENTATION_PART)? else {
        return Ok(numbered_slide_parts(package));
    };
    let rels = package.relationships(PRESENTATION_PART)?;
    let mut reader = Reader::from_str(&xml);
    let mut slides = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"sldId" {
                    continue;
                }
                let Some(rel_id) = relationship_id(&e) else {
                    continue;
                };
                match rels.get(&rel_id) {
                    Some(target) => slides.push(target.clone()),
                    None => tracing::warn!(
                        file = %package.filename(),
                        rel_id = %rel_id,
                        "Slide relationship not found"
                    ),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::malformed(
                    package.filename(),
                    format!("{}: {}", PRESENTATION_PART, e),
                ))
            }
            _ => {}
        }
    }

    Ok(slides)
}

/// The prefixed `r:id` of a `p:sldId`; the bare `id` attribute is the slide id
fn relationship_id(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Slide parts sorted by slide number
fn numbered_slide_parts(package: &Package<'_>) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = package
        .part_names()
        .into_iter()
        .filter_map(|name| {
            let number = name
                .strip_prefix(SLIDE_PREFIX)?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);
    slides.into_iter().map(|(_, name)| name).collect()
}

#[derive(Default)]
struct SlideState {
    shape_depth: usize,
    shape_paragraphs: Vec<String>,
    paragraph: String,
    in_table: bool,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
    in_text: bool,
    fallback_depth: usize,
}

struct SlideWalker<'w, 'a> {
    package: &'w mut Package<'a>,
    rels: &'w HashMap<String, String>,
    scope: &'w mut AssetScope,
    result: &'w mut ExtractionResult,
    state: SlideState,
}

impl<'w, 'a> SlideWalker<'w, 'a> {
    fn walk(mut self, slide: &str, xml: &str) -> Result<()> {
        let mut reader = Reader::from_str(xml);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if e.local_name().as_ref() == b"Fallback" {
                        self.state.fallback_depth += 1;
                    } else if self.state.fallback_depth == 0 {
                        self.start(&e)?;
                    }
                }
                Ok(Event::Empty(e)) => {
                    if self.state.fallback_depth == 0 {
                        self.empty(&e)?;
                    }
                }
                Ok(Event::Text(e)) => {
                    if self.state.in_text && self.state.fallback_depth == 0 {
                        let text = e.unescape().map_err(|err| {
                            Error::malformed(self.package.filename(), format!("{}: {}", slide, err))
                        })?;
                        self.push_text(&text);
                    }
                }
                Ok(Event::End(e)) => {
                    let name = e.local_name();
                    if name.as_ref() == b"Fallback" {
                        self.state.fallback_depth = self.state.fallback_depth.saturating_sub(1);
                    } else if self.state.fallback_depth == 0 {
                        self.end(name.as_ref());
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::malformed(
                        self.package.filename(),
                        format!("{}: {}", slide, e),
                    ))
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"sp" => {
                self.state.shape_depth += 1;
                if self.state.shape_depth == 1 {
                    self.state.shape_paragraphs.clear();
                    self.state.paragraph.clear();
                }
            }
            b"t" => self.state.in_text = true,
            b"tbl" => {
                self.state.in_table = true;
                self.state.rows.clear();
            }
            b"tr" if self.state.in_table => self.state.row.clear(),
            b"tc" if self.state.in_table => self.state.cell.clear(),
            _ => self.empty(e)?,
        }
        Ok(())
    }

    fn empty(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"br" => self.push_text("\n"),
            b"blip" => {
                if let Some(id) = attribute(e, b"embed") {
                    if let Some(block) = self.package.embedded_image(self.rels, &id, self.scope)? {
                        self.result.push(block);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        let state = &mut self.state;
        match name {
            b"t" => state.in_text = false,
            b"p" => {
                if state.in_table {
                    state.cell.push(' ');
                } else {
                    let paragraph = std::mem::take(&mut state.paragraph);
                    let trimmed = paragraph.trim();
                    if !trimmed.is_empty() {
                        state.shape_paragraphs.push(trimmed.to_string());
                    }
                }
            }
            b"sp" => {
                state.shape_depth = state.shape_depth.saturating_sub(1);
                if state.shape_depth == 0 && !state.shape_paragraphs.is_empty() {
                    let text = std::mem::take(&mut state.shape_paragraphs).join("\n");
                    self.result.push(ContentBlock::text(text));
                }
            }
            b"tc" if state.in_table => {
                let cell = state.cell.split_whitespace().collect::<Vec<_>>().join(" ");
                state.row.push(cell);
            }
            b"tr" if state.in_table => {
                let row = std::mem::take(&mut state.row);
                state.rows.push(row);
            }
            b"tbl" => {
                state.in_table = false;
                let rows = std::mem::take(&mut state.rows);
                if !rows.is_empty() {
                    self.result.push(ContentBlock::table(rows));
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.state.in_table {
            self.state.cell.push_str(text);
        } else if self.state.shape_depth > 0 {
            self.state.paragraph.push_str(text);
        }
    }
}
