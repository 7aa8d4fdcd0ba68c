//! Delimited text (CSV) reading with encoding and delimiter auto-detection.

use crate::error::LoadResult;
use crate::models::CellValue;

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string. Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// What [`read_grid`] found out about the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DelimitedGrid {
    pub encoding: String,
    pub delimiter: char,
    /// Physical records, fields untouched. Blank fields become empty cells.
    pub rows: Vec<Vec<CellValue>>,
}

/// Decodes and splits a delimited payload into raw rows.
///
/// Fields stay text even when they look numeric.
pub fn read_grid(bytes: &[u8]) -> LoadResult<DelimitedGrid> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::text).collect());
    }

    Ok(DelimitedGrid {
        encoding,
        delimiter,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
    }

    #[test]
    fn test_detect_delimiter_pipe() {
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_single_column_defaults_to_comma() {
        assert_eq!(detect_delimiter("POS Code\nA1"), ',');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_bom_stripped() {
        let bytes = b"\xEF\xBB\xBFPOS Code,Client Versions";
        assert_eq!(decode_content(bytes, "utf-8"), "POS Code,Client Versions");
    }

    #[test]
    fn test_quoted_fields_and_ragged_rows() {
        let grid = read_grid(b"POS Code;Project Description\n\"A1\";\"ROI; spring\"\nB2\n").unwrap();
        assert_eq!(grid.delimiter, ';');
        assert_eq!(grid.rows.len(), 3);
        assert_eq!(grid.rows[1][1], CellValue::Text("ROI; spring".into()));
        assert_eq!(grid.rows[2].len(), 1);
    }

    #[test]
    fn test_fields_stay_text() {
        let grid = read_grid(b"Client Versions\n 3 \n\n").unwrap();
        assert_eq!(grid.rows[1], vec![CellValue::Text(" 3 ".into())]);
    }
}
