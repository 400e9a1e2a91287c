//! CSV and plain-text extraction

use crate::error::{Error, Result};
use crate::types::{ContentBlock, DocumentFormat, ExtractionResult};

/// One table: the header row followed by every record
pub(crate) fn extract_csv(data: &[u8], filename: &str) -> Result<ExtractionResult> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();

    let headers = reader
        .headers()
        .map_err(|e| Error::malformed(filename, e.to_string()))?;
    if headers.iter().any(|h| !h.trim().is_empty()) {
        rows.push(headers.iter().map(|h| h.trim().to_string()).collect::<Vec<_>>());
    }

    for record in reader.records() {
        let record = record.map_err(|e| Error::malformed(filename, e.to_string()))?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    let mut result = ExtractionResult::new(DocumentFormat::Csv);
    if !rows.is_empty() {
        result.push(ContentBlock::table(rows));
    }
    Ok(result)
}

/// One text block with the whole file; whitespace-only files yield nothing
pub(crate) fn extract_txt(data: &[u8]) -> Result<ExtractionResult> {
    let content = String::from_utf8_lossy(data);
    let content = content.trim_start_matches('\u{feff}').trim();

    let mut result = ExtractionResult::new(DocumentFormat::Txt);
    if !content.is_empty() {
        result.push(ContentBlock::text(content));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_header_plus_rows() {
        let result = extract_csv(b"a,b\n1,2\n3,4\n", "data.csv").unwrap();
        assert_eq!(
            result.into_blocks(),
            vec![ContentBlock::table(vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["1".to_string(), "2".to_string()],
                vec!["3".to_string(), "4".to_string()],
            ])]
        );
    }

    #[test]
    fn test_csv_ragged_rows_allowed() {
        let result = extract_csv(b"name,role,team\nAda,Engineer\n", "people.csv").unwrap();
        match &result.blocks()[0] {
            ContentBlock::Table { rows, .. } => assert_eq!(rows[1], vec!["Ada", "Engineer"]),
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_csv_invalid_utf8_is_malformed() {
        let result = extract_csv(b"a,b\n\xff\xfe,2\n", "bad.csv");
        assert!(matches!(result, Err(Error::MalformedInput { .. })));
    }

    #[test]
    fn test_empty_csv_has_no_blocks() {
        assert!(extract_csv(b"", "empty.csv").unwrap().is_empty());
    }

    #[test]
    fn test_txt_whole_file() {
        let result = extract_txt(b"\xef\xbb\xbfLine one\nLine two\n\n").unwrap();
        assert_eq!(result.into_blocks(), vec![ContentBlock::text("Line one\nLine two")]);
    }

    #[test]
    fn test_whitespace_txt_has_no_blocks() {
        assert!(extract_txt(b"  \n\t\n").unwrap().is_empty());
    }
}
