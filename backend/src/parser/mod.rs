//! Table loading: `.xlsx` workbooks and delimited text into a [`Dataset`].
//!
//! The format is sniffed from the payload, not the file name: ZIP magic means
//! a workbook, anything else is read as CSV.
//!
//! # Example
//! ```ignore
//! use kpiload::parser::{load_file, LoadOptions};
//!
//! let table = load_file("report.xlsx".as_ref(), &LoadOptions::sheet("general_report"))?;
//! println!("{} rows from {}", table.source.row_count, table.source.sheet);
//! ```

pub mod delimited;
pub mod xlsx;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};
use crate::models::{CellValue, Dataset};

pub use delimited::{decode_content, detect_delimiter, detect_encoding};
pub use xlsx::XlsxWorkbook;

/// Pseudo-sheet name reported for delimited text.
pub const CSV_SHEET_NAME: &str = "csv";

/// Which sheet to read and where its headers are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadOptions {
    /// `None` reads the first sheet. Ignored for CSV.
    pub sheet_name: Option<String>,
    /// Zero-based row holding the headers; earlier rows are skipped.
    pub header_row: usize,
}

impl LoadOptions {
    pub fn sheet(name: impl Into<String>) -> Self {
        Self {
            sheet_name: Some(name.into()),
            header_row: 0,
        }
    }
}

/// Container format of a loaded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Xlsx,
    Csv,
}

/// Where a dataset came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub format: SourceFormat,
    pub file_name: String,
    pub sheet: String,
    pub header_row: usize,
    pub row_count: usize,
    pub columns: Vec<String>,
    /// Detected text encoding (CSV only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Detected delimiter (CSV only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

/// A dataset plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable {
    pub dataset: Dataset,
    pub source: SourceInfo,
}

/// True when the payload starts with the ZIP local header magic.
pub fn is_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(xlsx::ZIP_MAGIC)
}

/// Loads a table from an in-memory payload.
pub fn load_bytes(bytes: &[u8], file_name: &str, options: &LoadOptions) -> LoadResult<LoadedTable> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyFile);
    }

    if is_workbook(bytes) {
        let mut workbook = XlsxWorkbook::open(bytes)?;
        let (sheet, grid) = workbook.read_sheet(options.sheet_name.as_deref())?;
        let dataset = grid_to_dataset(grid, options.header_row)?;
        Ok(LoadedTable {
            source: SourceInfo {
                format: SourceFormat::Xlsx,
                file_name: file_name.to_string(),
                sheet,
                header_row: options.header_row,
                row_count: dataset.len(),
                columns: dataset.columns.clone(),
                encoding: None,
                delimiter: None,
            },
            dataset,
        })
    } else {
        let grid = delimited::read_grid(bytes)?;
        if grid.rows.is_empty() {
            return Err(LoadError::EmptyFile);
        }
        let dataset = grid_to_dataset(grid.rows, options.header_row)?;
        Ok(LoadedTable {
            source: SourceInfo {
                format: SourceFormat::Csv,
                file_name: file_name.to_string(),
                sheet: CSV_SHEET_NAME.to_string(),
                header_row: options.header_row,
                row_count: dataset.len(),
                columns: dataset.columns.clone(),
                encoding: Some(grid.encoding),
                delimiter: Some(grid.delimiter),
            },
            dataset,
        })
    }
}

/// Reads `path` and defers to [`load_bytes`].
pub fn load_file(path: &Path, options: &LoadOptions) -> LoadResult<LoadedTable> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    load_bytes(&bytes, &file_name, options)
}

/// Sheet names in workbook order; CSV reports a single pseudo-sheet.
pub fn list_sheets(bytes: &[u8]) -> LoadResult<Vec<String>> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyFile);
    }
    if is_workbook(bytes) {
        Ok(XlsxWorkbook::open(bytes)?.sheet_names())
    } else {
        Ok(vec![CSV_SHEET_NAME.to_string()])
    }
}

/// Splits a raw grid at `header_row`.
///
/// Trailing blank header cells are dropped; blank data rows are skipped but
/// every kept row remembers its sheet row. Cell text is kept as read.
fn grid_to_dataset(grid: Vec<Vec<CellValue>>, header_row: usize) -> LoadResult<Dataset> {
    if header_row >= grid.len() {
        return Err(LoadError::HeaderRowOutOfRange {
            header_row,
            rows: grid.len(),
        });
    }

    let mut rows = grid.into_iter().enumerate().skip(header_row);
    let header_cells = rows.next().map(|(_, cells)| cells).unwrap_or_default();
    let width = header_cells
        .iter()
        .rposition(|c| !c.is_blank())
        .map_or(0, |i| i + 1);
    let columns: Vec<String> = header_cells
        .iter()
        .take(width)
        .map(|c| c.as_text().unwrap_or_default())
        .collect();

    let (source_rows, data): (Vec<usize>, Vec<Vec<CellValue>>) = rows
        .filter(|(_, row)| row.iter().take(width).any(|c| !c.is_blank()))
        .unzip();

    Ok(Dataset::new(columns, data).with_source_rows(source_rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::io::Write;

    fn report_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let notes = workbook.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write_string(0, 0, "ignore me").unwrap();

        let sheet = workbook.add_worksheet();
        sheet.set_name("general_report").unwrap();
        sheet.write_string(0, 0, "Generated 2024-03-01").unwrap();
        sheet.write_string(1, 0, "POS Code").unwrap();
        sheet.write_string(1, 1, "Client Versions").unwrap();
        sheet.write_string(1, 2, "Category").unwrap();
        sheet.write_number(2, 0, 1042.0).unwrap();
        sheet.write_number(2, 1, 2.0).unwrap();
        sheet.write_string(2, 2, "Members").unwrap();
        // Row 4 left blank on purpose.
        sheet.write_string(4, 0, "B7").unwrap();
        sheet.write_number(4, 1, 1.0).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_load_named_sheet_with_header_offset() {
        let bytes = report_workbook();
        let options = LoadOptions {
            sheet_name: Some("general_report".into()),
            header_row: 1,
        };
        let table = load_bytes(&bytes, "report.xlsx", &options).unwrap();

        assert_eq!(table.dataset.columns, vec!["POS Code", "Client Versions", "Category"]);
        assert_eq!(table.dataset.len(), 2);
        assert_eq!(table.dataset.rows[0][0], CellValue::Number(1042.0));
        assert_eq!(table.dataset.rows[1][2], CellValue::Empty);
        assert_eq!(table.source.format, SourceFormat::Xlsx);
        assert_eq!(table.source.sheet, "general_report");
        assert_eq!(table.source.row_count, 2);
    }

    #[test]
    fn test_first_sheet_when_unnamed() {
        let bytes = report_workbook();
        let table = load_bytes(&bytes, "report.xlsx", &LoadOptions::default()).unwrap();
        assert_eq!(table.source.sheet, "Notes");
        assert_eq!(table.dataset.columns, vec!["ignore me"]);
        assert!(table.dataset.is_empty());
    }

    #[test]
    fn test_sheet_not_found_lists_available() {
        let bytes = report_workbook();
        let err = load_bytes(&bytes, "report.xlsx", &LoadOptions::sheet("Summary")).unwrap_err();
        assert!(err.to_string().contains("general_report"));
    }

    #[test]
    fn test_header_row_out_of_range() {
        let bytes = report_workbook();
        let options = LoadOptions {
            sheet_name: Some("general_report".into()),
            header_row: 9,
        };
        assert!(matches!(
            load_bytes(&bytes, "report.xlsx", &options),
            Err(LoadError::HeaderRowOutOfRange { header_row: 9, rows: 5 })
        ));
    }

    #[test]
    fn test_list_sheets() {
        let bytes = report_workbook();
        assert_eq!(list_sheets(&bytes).unwrap(), vec!["Notes", "general_report"]);
        assert_eq!(list_sheets(b"a,b\n1,2").unwrap(), vec!["csv"]);
    }

    #[test]
    fn test_load_csv() {
        let csv = "POS Code;Client Versions;Category\nA1;3;Members\n;;\nB2;1;Mobile\n";
        let table = load_bytes(csv.as_bytes(), "report.csv", &LoadOptions::sheet("ignored")).unwrap();

        assert_eq!(table.source.format, SourceFormat::Csv);
        assert_eq!(table.source.sheet, "csv");
        assert_eq!(table.source.delimiter, Some(';'));
        assert_eq!(table.dataset.len(), 2);
        assert_eq!(table.dataset.rows[0][1], CellValue::Text("3".into()));
    }

    #[test]
    fn test_rows_padded_to_header_width() {
        let table = load_bytes(b"a,b,c\n1\n1,2,3,4\n", "x.csv", &LoadOptions::default()).unwrap();
        assert_eq!(table.dataset.rows[0], vec![CellValue::Text("1".into()), CellValue::Empty, CellValue::Empty]);
        assert_eq!(table.dataset.rows[1].len(), 3);
    }

    #[test]
    fn test_source_rows_skip_blank_lines() {
        let bytes = report_workbook();
        let options = LoadOptions {
            sheet_name: Some("general_report".into()),
            header_row: 1,
        };
        let table = load_bytes(&bytes, "report.xlsx", &options).unwrap();
        assert_eq!(table.dataset.source_rows, vec![2, 4]);
        assert_eq!(table.dataset.sheet_row_number(1), Some(5));
    }

    #[test]
    fn test_cell_text_kept_as_read() {
        let table = load_bytes(b" POS Code ,Category\nA1,Members \n", "x.csv", &LoadOptions::default()).unwrap();
        assert_eq!(table.dataset.columns, vec![" POS Code ", "Category"]);
        assert_eq!(table.dataset.rows[0][1], CellValue::Text("Members ".into()));
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(load_bytes(b"", "x.csv", &LoadOptions::default()), Err(LoadError::EmptyFile)));
        assert!(matches!(load_bytes(b"\n\n", "x.csv", &LoadOptions::default()), Err(LoadError::EmptyFile)));
    }

    #[test]
    fn test_corrupt_workbook() {
        let err = load_bytes(b"PK\x03\x04garbage", "bad.xlsx", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Archive(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"Order Number,Ordered By\n1,Store 4\n").unwrap();
        let table = load_file(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(table.dataset.columns, vec!["Order Number", "Ordered By"]);
        assert!(table.source.file_name.ends_with(".csv"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_file(Path::new("/definitely/not/here.xlsx"), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
