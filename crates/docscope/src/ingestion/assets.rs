//! Persistence of extracted image assets and staged uploads

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::document::{path_component, DocumentContext};

/// Raster image extensions we keep; vector formats (emf, wmf, svg) are dropped
const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp"];

/// Hex characters of the content hash used in asset file names
const HASH_PREFIX_LEN: usize = 16;

/// Lower-cased raster extension of `name`, if it has one
pub fn raster_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
    RASTER_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Root of the on-disk working area
#[derive(Debug, Clone)]
pub struct AssetStore {
    work_dir: PathBuf,
}

impl AssetStore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// `<work_dir>/assets/<user>/<document>`
    pub fn asset_dir(&self, ctx: &DocumentContext) -> PathBuf {
        self.scoped("assets", ctx)
    }

    /// `<work_dir>/uploads/<user>/<document>`
    pub fn upload_dir(&self, ctx: &DocumentContext) -> PathBuf {
        self.scoped("uploads", ctx)
    }

    fn scoped(&self, area: &str, ctx: &DocumentContext) -> PathBuf {
        self.work_dir
            .join(area)
            .join(path_component(&ctx.user_id))
            .join(path_component(&ctx.document_id))
    }

    /// Writer for the assets of one document
    pub fn scope(&self, ctx: &DocumentContext) -> AssetScope {
        AssetScope {
            dir: self.asset_dir(ctx),
            created: false,
            written: 0,
        }
    }
}

/// Writes the image assets of a single document
#[derive(Debug)]
pub struct AssetScope {
    dir: PathBuf,
    created: bool,
    written: usize,
}

impl AssetScope {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of assets written through this scope
    pub fn written(&self) -> usize {
        self.written
    }

    /// Persist `bytes` under a content-addressed name and return the path.
    ///
    /// Identical bytes within one document map to the same file.
    pub fn write(&mut self, bytes: &[u8], extension: &str) -> Result<PathBuf> {
        if !self.created {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                Error::storage(format!(
                    "Failed to create asset directory {}: {}",
                    self.dir.display(),
                    e
                ))
            })?;
            self.created = true;
        }

        let digest = hex::encode(Sha256::digest(bytes));
        let path = self
            .dir
            .join(format!("{}.{}", &digest[..HASH_PREFIX_LEN], extension));

        if !path.exists() {
            std::fs::write(&path, bytes).map_err(|e| {
                Error::storage(format!("Failed to write asset {}: {}", path.display(), e))
            })?;
        }

        self.written += 1;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored image asset");
        Ok(path)
    }
}
