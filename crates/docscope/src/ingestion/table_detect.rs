//! Layout-based table detection over extracted PDF page text

use regex::Regex;
use std::sync::OnceLock;

use crate::error::Result;

/// Rows of one detected table
pub type DetectedTable = Vec<Vec<String>>;

/// Finds tables in the text of a whole document.
///
/// Errors are reported to the caller, which treats them as "no tables".
pub trait TableDetector: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Detect tables across pages, in page order
    fn detect(&self, pages: &[String]) -> Result<Vec<DetectedTable>>;
}

/// Groups runs of consecutive tabular lines into tables.
///
/// A line is tabular when it splits into at least two cells on tabs, pipes,
/// or gaps of three or more spaces.
#[derive(Debug, Clone)]
pub struct LayoutTableDetector {
    min_rows: usize,
}

impl Default for LayoutTableDetector {
    fn default() -> Self {
        Self { min_rows: 2 }
    }
}

impl LayoutTableDetector {
    pub fn with_min_rows(min_rows: usize) -> Self {
        Self {
            min_rows: min_rows.max(1),
        }
    }
}

impl TableDetector for LayoutTableDetector {
    fn name(&self) -> &str {
        "layout"
    }

    fn detect(&self, pages: &[String]) -> Result<Vec<DetectedTable>> {
        let mut tables = Vec::new();

        for page in pages {
            let mut current: DetectedTable = Vec::new();
            for line in page.lines() {
                match split_cells(line) {
                    Some(cells) => current.push(cells),
                    None => {
                        if current.len() >= self.min_rows {
                            tables.push(std::mem::take(&mut current));
                        } else {
                            current.clear();
                        }
                    }
                }
            }
            // Tables do not continue across page breaks
            if current.len() >= self.min_rows {
                tables.push(current);
            }
        }

        Ok(tables)
    }
}

fn space_gap() -> &'static Regex {
    static GAP: OnceLock<Regex> = OnceLock::new();
    GAP.get_or_init(|| Regex::new(r" {3,}").expect("static regex"))
}

/// Split a tabular line into trimmed cells; `None` if the line is not tabular
fn split_cells(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.len() < 3 {
        return None;
    }

    let cells: Vec<&str> = if trimmed.matches('\t').count() >= 1 {
        trimmed.split('\t').collect()
    } else if trimmed.matches('|').count() >= 2 {
        trimmed.trim_matches('|').split('|').collect()
    } else if space_gap().find_iter(trimmed).count() >= 1 {
        space_gap().split(trimmed).collect()
    } else {
        return None;
    };

    let cells: Vec<String> = cells.iter().map(|c| c.trim().to_string()).collect();
    let filled = cells.iter().filter(|c| !c.is_empty()).count();
    (filled >= 2).then_some(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_cells_patterns() {
        assert_eq!(
            split_cells("Name\tDose\tFrequency").unwrap(),
            vec!["Name", "Dose", "Frequency"]
        );
        assert_eq!(split_cells("| K | 4.2 | mmol/L |").unwrap(), vec!["K", "4.2", "mmol/L"]);
        assert_eq!(
            split_cells("Potassium    4.2    mmol/L").unwrap(),
            vec!["Potassium", "4.2", "mmol/L"]
        );
        assert!(split_cells("An ordinary sentence, with words.").is_none());
        assert!(split_cells("single |").is_none());
    }

    #[test]
    fn test_detect_groups_consecutive_lines() {
        let pages = vec![
            "Quarterly results\nRegion    Q1    Q2\nNorth    10    12\nSouth    8    9\nEnd of table".to_string(),
            "Lonely    row\nprose only".to_string(),
        ];
        let tables = LayoutTableDetector::default().detect(&pages).unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[0][0], vec!["Region", "Q1", "Q2"]);
    }

    #[test]
    fn test_detect_table_at_page_end() {
        let pages = vec!["a\tb\nc\td".to_string()];
        let tables = LayoutTableDetector::default().detect(&pages).unwrap();
        assert_eq!(tables, vec![vec![vec!["a", "b"], vec!["c", "d"]]
            .into_iter()
            .map(|r| r.into_iter().map(String::from).collect::<Vec<_>>())
            .collect::<Vec<_>>()]);
    }

    #[test]
    fn test_no_tables_in_prose() {
        let pages = vec!["Just a paragraph.\nAnother line.".to_string()];
        assert!(LayoutTableDetector::default().detect(&pages).unwrap().is_empty());
    }
}
