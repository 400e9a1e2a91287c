//! Shared helpers for Office Open XML (zip) containers

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::assets::{raster_extension, AssetScope};
use crate::error::{Error, Result};
use crate::types::ContentBlock;

/// Largest decompressed size accepted for a single part
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Upper bound on the buffer reserved up front from a part's declared size
const PREALLOC_CAP: u64 = 1024 * 1024;

/// An opened OOXML package
pub(crate) struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    filename: String,
    part_limit: u64,
}

impl<'a> Package<'a> {
    pub fn open(data: &'a [u8], filename: &str) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::malformed(filename, e.to_string()))?;
        Ok(Self {
            archive,
            filename: filename.to_string(),
            part_limit: MAX_PART_BYTES,
        })
    }

    #[cfg(test)]
    pub fn with_part_limit(mut self, limit: u64) -> Self {
        self.part_limit = limit;
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn part_names(&self) -> Vec<String> {
        self.archive.file_names().map(|s| s.to_string()).collect()
    }

    /// Read a part as bytes; `None` if the package has no such part
    pub fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(Error::malformed(&self.filename, e.to_string())),
        };
        let limit = self.part_limit;
        if file.size() > limit {
            return Err(Error::malformed(
                &self.filename,
                format!("{}: declared size {} exceeds {} bytes", name, file.size(), limit),
            ));
        }

        // The declared size is untrusted, so the read is bounded as well
        let mut buf = Vec::with_capacity(file.size().min(PREALLOC_CAP) as usize);
        file.by_ref()
            .take(limit + 1)
            .read_to_end(&mut buf)
            .map_err(|e| Error::malformed(&self.filename, format!("{}: {}", name, e)))?;
        if buf.len() as u64 > limit {
            return Err(Error::malformed(
                &self.filename,
                format!("{}: decompressed size exceeds {} bytes", name, limit),
            ));
        }
        Ok(Some(buf))
    }

    /// Read a part as UTF-8 text
    pub fn read_xml(&mut self, name: &str) -> Result<Option<String>> {
        match self.read_bytes(name)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| Error::malformed(&self.filename, format!("{}: {}", name, e))),
            None => Ok(None),
        }
    }

    /// Internal relationships of `part`, keyed by relationship id, with
    /// targets resolved to package part names
    pub fn relationships(&mut self, part: &str) -> Result<HashMap<String, String>> {
        let (dir, file) = match part.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", part),
        };
        let rels_name = if dir.is_empty() {
            format!("_rels/{}.rels", file)
        } else {
            format!("{}/_rels/{}.rels", dir, file)
        };

        let Some(xml) = self.read_xml(&rels_name)? else {
            return Ok(HashMap::new());
        };

        let mut reader = Reader::from_str(&xml);
        reader.config_mut().trim_text(true);
        let mut rels = HashMap::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    if e.local_name().as_ref() != b"Relationship" {
                        continue;
                    }
                    let id = attribute(&e, b"Id");
                    let target = attribute(&e, b"Target");
                    let external = attribute(&e, b"TargetMode")
                        .map(|m| m.eq_ignore_ascii_case("External"))
                        .unwrap_or(false);
                    if let (Some(id), Some(target), false) = (id, target, external) {
                        rels.insert(id, resolve_target(dir, &target));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::malformed(
                        &self.filename,
                        format!("{}: {}", rels_name, e),
                    ))
                }
                _ => {}
            }
        }

        Ok(rels)
    }

    /// Turn an `r:embed` reference into an image block.
    ///
    /// Unknown ids, missing media and non-raster targets are skipped with a warning.
    pub fn embedded_image(
        &mut self,
        rels: &HashMap<String, String>,
        rel_id: &str,
        scope: &mut AssetScope,
    ) -> Result<Option<ContentBlock>> {
        let Some(target) = rels.get(rel_id) else {
            tracing::warn!(file = %self.filename, rel_id, "Image relationship not found");
            return Ok(None);
        };
        let Some(ext) = raster_extension(target) else {
            tracing::debug!(file = %self.filename, target = %target, "Skipping non-raster media");
            return Ok(None);
        };
        let Some(bytes) = self.read_bytes(target)? else {
            tracing::warn!(file = %self.filename, target = %target, "Image part missing from package");
            return Ok(None);
        };
        if bytes.is_empty() {
            tracing::warn!(file = %self.filename, target = %target, "Skipping empty image part");
            return Ok(None);
        }

        let path = scope.write(&bytes, &ext)?;
        Ok(Some(ContentBlock::image(path)))
    }
}

/// Resolve a relationship target relative to the directory of its source part
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute.split('/').collect());
    }
    let mut parts: Vec<&str> = base_dir.split('/').collect();
    parts.extend(target.split('/'));
    normalize(parts)
}

fn normalize(parts: Vec<&str>) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

/// Unescaped value of the attribute with the given local name
pub(crate) fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Build a zip package in memory from `(name, contents)` pairs
#[cfg(test)]
pub(crate) fn build_package(parts: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in parts {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
