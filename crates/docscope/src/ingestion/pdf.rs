//! PDF extraction: page text, embedded raster images, detected tables

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use super::assets::AssetScope;
use super::table_detect::TableDetector;
use crate::error::{Error, Result};
use crate::types::{ContentBlock, DocumentFormat, ExtractionResult};

/// Guard against malformed `/Parent` cycles when looking up inherited resources
const MAX_PARENT_DEPTH: usize = 32;

pub(crate) struct PdfOptions<'d> {
    pub timeout: Duration,
    pub table_detector: Option<&'d dyn TableDetector>,
}

pub(crate) fn extract(
    data: &[u8],
    filename: &str,
    scope: &mut AssetScope,
    options: &PdfOptions<'_>,
) -> Result<ExtractionResult> {
    let doc = Document::load_mem(data)
        .map_err(|e| Error::malformed(filename, format!("Failed to load PDF: {}", e)))?;
    let pages = doc.get_pages();

    let page_texts = page_texts(data, &doc, filename, options.timeout);
    let mut result = ExtractionResult::new(DocumentFormat::Pdf);

    for (index, (page_number, page_id)) in pages.iter().enumerate() {
        let text = page_texts.get(index).map(String::as_str).unwrap_or_default();
        if !text.is_empty() {
            result.push(ContentBlock::text(text));
        }

        for (bytes, ext) in page_images(&doc, *page_id, filename, *page_number) {
            let path = scope.write(&bytes, ext)?;
            result.push(ContentBlock::image(path));
        }
    }

    match options.table_detector {
        Some(detector) => match detector.detect(&page_texts) {
            Ok(tables) => {
                tracing::debug!(file = %filename, detector = detector.name(), tables = tables.len(), "Table detection finished");
                for rows in tables {
                    result.push(ContentBlock::table(rows));
                }
            }
            Err(e) => {
                tracing::warn!(file = %filename, detector = detector.name(), error = %e, "Table detection failed, continuing without tables");
            }
        },
        None => {
            tracing::warn!(file = %filename, "Table detection unavailable, continuing without tables");
        }
    }

    Ok(result)
}

/// Cleaned text of every page, in page order
fn page_texts(data: &[u8], doc: &Document, filename: &str, timeout: Duration) -> Vec<String> {
    let page_count = doc.get_pages().len();

    let raw = match extract_pages_with_timeout(data, timeout) {
        Ok(pages) if pages.len() == page_count => pages,
        Ok(pages) => {
            tracing::warn!(
                file = %filename,
                extracted = pages.len(),
                expected = page_count,
                "pdf-extract page count mismatch, using lopdf fallback"
            );
            extract_pages_fallback(doc)
        }
        Err(reason) => {
            tracing::warn!(file = %filename, reason = %reason, "pdf-extract failed, using lopdf fallback");
            extract_pages_fallback(doc)
        }
    };

    raw.iter().map(|text| cleanup_pdf_text(text)).collect()
}

/// Run pdf-extract on a watchdog thread; it can hang or panic on unusual fonts
fn extract_pages_with_timeout(
    data: &[u8],
    timeout: Duration,
) -> std::result::Result<Vec<String>, String> {
    let data_vec = data.to_vec();
    run_with_watchdog(timeout, move || {
        pdf_extract::extract_text_from_mem_by_pages(&data_vec)
    })
}

/// Run `task` on its own thread, turning a timeout or a panic into an error
fn run_with_watchdog<T, E, F>(timeout: Duration, task: F) -> std::result::Result<T, String>
where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
{
    use std::sync::mpsc;
    use std::thread;

    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let _ = tx.send(task());
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => {
            let _ = handle.join();
            Ok(value)
        }
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e.to_string())
        }
        // The thread cannot be killed; it is left to finish on its own
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(format!("timed out after {}s", timeout.as_secs()))
        }
        // Relies on unwinding; the release profile must not abort on panic
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            let _ = handle.join();
            Err("extraction thread panicked".to_string())
        }
    }
}

/// Per-page extraction with lopdf; unreadable pages yield empty text
fn extract_pages_fallback(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .keys()
        .map(|page_number| match doc.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "lopdf could not extract page text");
                String::new()
            }
        })
        .collect()
}

/// Glyph names that leak into extracted text, with their replacements
fn glyph_replacements() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        HashMap::from([
            // Hyphens and dashes
            ("uni2010", "-"),
            ("uni2011", "-"),
            ("uni2012", "-"),
            ("uni2013", "-"),
            ("uni2014", "--"),
            // Quotes
            ("uni2018", "'"),
            ("uni2019", "'"),
            ("uni201C", "\""),
            ("uni201D", "\""),
            // Bullets, ellipsis, spaces
            ("uni2022", "* "),
            ("uni2026", "..."),
            ("uni00A0", " "),
            // Ligatures
            ("f_f_i", "ffi"),
            ("f_f_l", "ffl"),
            ("f_i", "fi"),
            ("f_l", "fl"),
            ("f_f", "ff"),
        ])
    })
}

/// Replace glyph-name artifacts and typographic characters, drop NULs,
/// trim lines and drop blank ones
pub(crate) fn cleanup_pdf_text(text: &str) -> String {
    let mut result = text.replace('\0', "");

    for (glyph, replacement) in glyph_replacements() {
        for pattern in [format!("({})", glyph), format!("<{}>", glyph)] {
            if result.contains(&pattern) {
                result = result.replace(&pattern, replacement);
            }
        }
    }

    let result = result
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    result
        .lines()
        .map(|l| l.trim_end())
        .map(|l| l.trim_start_matches([' ', '\u{3000}']))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raster images drawn from the page's (possibly inherited) resources, as
/// `(bytes, extension)`; undecodable images are skipped with a warning
fn page_images(
    doc: &Document,
    page_id: ObjectId,
    filename: &str,
    page_number: u32,
) -> Vec<(Vec<u8>, &'static str)> {
    let Some(resources) = page_resources(doc, page_id) else {
        return Vec::new();
    };
    let Some(xobjects) = resolve_dict_entry(doc, resources, b"XObject") else {
        return Vec::new();
    };

    let mut images = Vec::new();
    for (name, obj_ref) in xobjects.iter() {
        let xobj = resolve_object(doc, obj_ref);
        let Object::Stream(stream) = xobj else {
            continue;
        };
        if !is_image_subtype(&stream.dict) {
            continue;
        }

        match image_bytes(doc, stream) {
            Ok(image) => images.push(image),
            Err(reason) => {
                tracing::warn!(
                    file = %filename,
                    page = page_number,
                    xobject = %String::from_utf8_lossy(name),
                    reason = %reason,
                    "Skipping undecodable PDF image"
                );
            }
        }
    }

    images
}

/// Walk the page and its `/Parent` chain for the nearest `/Resources`
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut dict = doc.get_object(page_id).ok()?.as_dict().ok()?;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(resources) = resolve_dict_entry(doc, dict, b"Resources") {
            return Some(resources);
        }
        let parent = dict.get(b"Parent").ok()?;
        dict = resolve_object(doc, parent).as_dict().ok()?;
    }

    None
}

fn is_image_subtype(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .map(|obj| matches!(obj, Object::Name(ref n) if n == b"Image"))
        .unwrap_or(false)
}

/// Names in the stream's `/Filter` entry, outermost first
fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| match o {
                Object::Name(n) => Some(n.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn image_bytes(
    doc: &Document,
    stream: &lopdf::Stream,
) -> std::result::Result<(Vec<u8>, &'static str), String> {
    let filters = filters(&stream.dict);
    let last = filters.last().map(Vec::as_slice);

    // Encoded image formats are stored as-is
    let encoded_ext = match last {
        Some(b"DCTDecode") => Some("jpg"),
        Some(b"JPXDecode") => Some("jp2"),
        _ => None,
    };
    if let Some(ext) = encoded_ext {
        let bytes = if filters.len() > 1 {
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone())
        } else {
            stream.content.clone()
        };
        if bytes.is_empty() {
            return Err("empty image stream".to_string());
        }
        return Ok((bytes, ext));
    }

    let raw = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| format!("cannot decode filters: {}", e))?
    };
    let png = raw_to_png(doc, &stream.dict, &raw)?;
    Ok((png, "png"))
}

/// Re-encode 8-bit gray/RGB raw samples as PNG
fn raw_to_png(
    doc: &Document,
    dict: &Dictionary,
    raw: &[u8],
) -> std::result::Result<Vec<u8>, String> {
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    let bpc = get_int(dict, b"BitsPerComponent").unwrap_or(8);
    if bpc != 8 {
        return Err(format!("unsupported BitsPerComponent {}", bpc));
    }

    let channels = channels(doc, dict).ok_or("unsupported color space")?;
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels as usize))
        .ok_or_else(|| format!("invalid dimensions {}x{}", width, height))?;
    if raw.len() < expected {
        return Err(format!(
            "raw buffer too small: {} bytes, expected {} ({}x{}x{})",
            raw.len(),
            expected,
            width,
            height,
            channels
        ));
    }
    let pixels = raw[..expected].to_vec();

    let img = match channels {
        1 => image::GrayImage::from_raw(width, height, pixels).map(image::DynamicImage::ImageLuma8),
        _ => image::RgbImage::from_raw(width, height, pixels).map(image::DynamicImage::ImageRgb8),
    }
    .ok_or("pixel buffer does not match dimensions")?;

    let mut png = std::io::Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| format!("PNG encode failed: {}", e))?;
    Ok(png.into_inner())
}

/// Positive image dimension that fits in `u32`
fn dimension(dict: &Dictionary, key: &[u8]) -> std::result::Result<u32, String> {
    let name = String::from_utf8_lossy(key);
    let value = get_int(dict, key).ok_or_else(|| format!("missing /{}", name))?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| format!("invalid /{} {}", name, value))
}

/// Channel count for gray and RGB color spaces; `None` for anything else
fn channels(doc: &Document, dict: &Dictionary) -> Option<u8> {
    let cs = match dict.get(b"ColorSpace") {
        Ok(obj) => resolve_object(doc, obj),
        Err(_) => return None,
    };

    match cs {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"CalRGB" => Some(3),
            _ => None,
        },
        Object::Array(arr) => match arr.first() {
            Some(Object::Name(n)) if n == b"ICCBased" => {
                let Object::Stream(icc) = resolve_object(doc, arr.get(1)?) else {
                    return None;
                };
                match get_int(&icc.dict, b"N")? {
                    1 => Some(1),
                    3 => Some(3),
                    _ => None,
                }
            }
            Some(Object::Name(n)) if n == b"CalGray" => Some(1),
            Some(Object::Name(n)) if n == b"CalRGB" => Some(3),
            _ => None,
        },
        _ => None,
    }
}

fn resolve_object<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn resolve_dict_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    let obj = dict.get(key).ok()?;
    resolve_object(doc, obj).as_dict().ok()
}

fn get_int(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok()?.as_i64().ok()
}
