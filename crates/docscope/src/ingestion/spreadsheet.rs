//! Excel (.xlsx) extraction: one named table per non-empty worksheet

use calamine::{Data, Reader};

use crate::error::{Error, Result};
use crate::types::{ContentBlock, DocumentFormat, ExtractionResult};

pub(crate) fn extract(data: &[u8], filename: &str) -> Result<ExtractionResult> {
    let cursor = std::io::Cursor::new(data);
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| Error::malformed(filename, e.to_string()))?;

    let mut result = ExtractionResult::new(DocumentFormat::Xlsx);

    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| Error::malformed(filename, format!("sheet '{}': {}", sheet_name, e)))?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        if rows.is_empty() {
            tracing::debug!(file = %filename, sheet = %sheet_name, "Skipping empty sheet");
            continue;
        }

        result.push(ContentBlock::named_table(sheet_name, rows));
    }

    Ok(result)
}

/// Render a cell as text; blanks and error cells become empty strings
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}
