//! Document ingestion: format extractors behind an extension dispatcher

mod assets;
mod docx;
mod ooxml;
mod parser;
mod pdf;
mod pptx;
mod spreadsheet;
pub mod table_detect;
mod text;

pub use assets::{raster_extension, AssetScope, AssetStore};
pub use parser::DocumentParser;
pub use table_detect::{DetectedTable, LayoutTableDetector, TableDetector};
