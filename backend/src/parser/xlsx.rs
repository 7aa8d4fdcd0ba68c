//! Minimal OOXML workbook reader.
//!
//! Reads cell values only: shared strings, inline strings, formula string
//! results, booleans and numbers. Styles (and therefore date formatting) are
//! ignored; dates come through as their serial numbers.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{LoadError, LoadResult};
use crate::models::{CellValue, MAX_SHEET_COLS, MAX_SHEET_ROWS};

/// Maximum decompressed bytes read from one ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// ZIP local file header magic; every xlsx starts with it.
pub const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    part: String,
}

/// An opened workbook: sheet directory plus shared strings.
pub struct XlsxWorkbook<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    sheets: Vec<SheetEntry>,
    shared_strings: Vec<String>,
}

impl<'a> XlsxWorkbook<'a> {
    pub fn open(bytes: &'a [u8]) -> LoadResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let workbook_xml = read_entry(&mut archive, WORKBOOK_PART)?.ok_or_else(|| LoadError::Xml {
            part: WORKBOOK_PART.to_string(),
            message: "missing from archive".to_string(),
        })?;
        let rels = match read_entry(&mut archive, WORKBOOK_RELS_PART)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        let sheets = parse_sheet_directory(&workbook_xml, &rels)?;

        let shared_strings = match read_entry(&mut archive, SHARED_STRINGS_PART)? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };

        Ok(Self {
            archive,
            sheets,
            shared_strings,
        })
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Reads a sheet as a grid of physical rows (row 1 of the sheet is index 0).
    ///
    /// `None` selects the first sheet. Returns the sheet name actually read.
    pub fn read_sheet(&mut self, name: Option<&str>) -> LoadResult<(String, Vec<Vec<CellValue>>)> {
        let entry = match name {
            Some(wanted) => self.sheets.iter().find(|s| s.name == wanted),
            None => self.sheets.first(),
        }
        .cloned()
        .ok_or_else(|| LoadError::SheetNotFound {
            sheet: name.unwrap_or("<first sheet>").to_string(),
            available: self.sheet_names(),
        })?;

        let xml = read_entry(&mut self.archive, &entry.part)?.ok_or_else(|| LoadError::Xml {
            part: entry.part.clone(),
            message: "missing from archive".to_string(),
        })?;
        let grid = parse_sheet(&xml, &self.shared_strings).map_err(|message| LoadError::Xml {
            part: entry.part.clone(),
            message,
        })?;
        Ok((entry.name, grid))
    }
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> LoadResult<Option<Vec<u8>>> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| LoadError::Xml {
            part: name.to_string(),
            message: e.to_string(),
        })?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(LoadError::Xml {
            part: name.to_string(),
            message: format!("exceeds size limit ({} bytes)", MAX_XML_ENTRY_BYTES),
        });
    }
    Ok(Some(out))
}

fn xml_error(part: &str, err: impl std::fmt::Display) -> LoadError {
    LoadError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Relationship id → target path inside the archive.
fn parse_relationships(xml: &[u8]) -> LoadResult<HashMap<String, String>> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                    rels.insert(id, resolve_target(&target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(WORKBOOK_RELS_PART, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn parse_sheet_directory(xml: &[u8], rels: &HashMap<String, String>) -> LoadResult<Vec<SheetEntry>> {
    let mut sheets = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name").unwrap_or_default();
                let position = sheets.len() + 1;
                // Fall back to the conventional part name when rels are absent.
                let part = attribute(&e, b"id")
                    .and_then(|id| rels.get(&id).cloned())
                    .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", position));
                sheets.push(SheetEntry { name, part });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(WORKBOOK_PART, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

fn parse_shared_strings(xml: &[u8]) -> LoadResult<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_t = false;
    // Phonetic runs (<rPh>) carry their own <t> that is not part of the value.
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(te)) if in_t => {
                let text = te.unescape().map_err(|e| xml_error(SHARED_STRINGS_PART, e))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(SHARED_STRINGS_PART, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column of an A1 reference. Columns past `XFD` are rejected.
fn column_index(reference: &str) -> Result<usize, String> {
    let mut column = 0_usize;
    for b in reference.bytes().take_while(u8::is_ascii_alphabetic) {
        let digit = usize::from(b.to_ascii_uppercase() - b'A') + 1;
        column = column
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit))
            .ok_or_else(|| format!("cell reference '{}' is outside the sheet", reference))?;
    }
    if column == 0 {
        return Err(format!("bad cell reference '{}'", reference));
    }
    bounded_column(column - 1).map_err(|_| format!("cell reference '{}' is outside the sheet", reference))
}

/// Zero-based row of a `<row r>` attribute.
fn row_index(reference: &str) -> Result<usize, String> {
    let row: usize = reference
        .trim()
        .parse()
        .map_err(|_| format!("bad row reference '{}'", reference))?;
    let idx = row
        .checked_sub(1)
        .ok_or_else(|| format!("bad row reference '{}'", reference))?;
    bounded_row(idx).map_err(|_| format!("row reference '{}' is outside the sheet", reference))
}

fn bounded_row(idx: usize) -> Result<usize, String> {
    if idx < MAX_SHEET_ROWS {
        Ok(idx)
    } else {
        Err(format!("more than {} rows", MAX_SHEET_ROWS))
    }
}

fn bounded_column(idx: usize) -> Result<usize, String> {
    if idx < MAX_SHEET_COLS {
        Ok(idx)
    } else {
        Err(format!("more than {} columns", MAX_SHEET_COLS))
    }
}

#[derive(Default)]
struct PendingCell {
    column: usize,
    kind: Option<String>,
    value: String,
}

fn finish_cell(cell: &PendingCell, shared_strings: &[String]) -> Result<CellValue, String> {
    let raw = cell.value.as_str();
    let value = match cell.kind.as_deref() {
        Some("s") => {
            let idx: usize = raw
                .trim()
                .parse()
                .map_err(|_| format!("bad shared string index '{}'", raw))?;
            let s = shared_strings
                .get(idx)
                .ok_or_else(|| format!("shared string {} out of range", idx))?;
            CellValue::text(s.clone())
        }
        Some("inlineStr") | Some("str") => CellValue::text(raw),
        Some("b") => CellValue::Bool(raw.trim() == "1"),
        // Error cells (#N/A, #REF!, ...) carry no usable value.
        Some("e") => CellValue::Empty,
        _ if raw.trim().is_empty() => CellValue::Empty,
        _ => match raw.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::text(raw),
        },
    };
    Ok(value)
}

fn parse_sheet(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<CellValue>>, String> {
    let mut grid: Vec<Vec<CellValue>> = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut row_idx = 0_usize;
    let mut next_row = 0_usize;
    let mut next_col = 0_usize;
    let mut cell: Option<PendingCell> = None;
    let mut capture = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = match attribute(&e, b"r") {
                        Some(r) => row_index(&r)?,
                        None => bounded_row(next_row)?,
                    };
                    next_row = row_idx + 1;
                    next_col = 0;
                }
                b"c" => {
                    let column = match attribute(&e, b"r") {
                        Some(r) => column_index(&r)?,
                        None => bounded_column(next_col)?,
                    };
                    next_col = column + 1;
                    cell = Some(PendingCell {
                        column,
                        kind: attribute(&e, b"t"),
                        value: String::new(),
                    });
                }
                // <v> holds the value; <t> only appears inside inline strings.
                b"v" | b"t" => capture = cell.is_some(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = match attribute(&e, b"r") {
                        Some(r) => row_index(&r)?,
                        None => bounded_row(next_row)?,
                    };
                    next_row = row_idx + 1;
                }
                b"c" => {
                    let column = match attribute(&e, b"r") {
                        Some(r) => column_index(&r)?,
                        None => bounded_column(next_col)?,
                    };
                    next_col = column + 1;
                }
                _ => {}
            },
            Event::Text(te) if capture => {
                if let Some(c) = cell.as_mut() {
                    c.value.push_str(&te.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    if let Some(done) = cell.take() {
                        let value = finish_cell(&done, shared_strings)?;
                        if !value.is_blank() {
                            if grid.len() <= row_idx {
                                grid.resize_with(row_idx + 1, Vec::new);
                            }
                            let row = &mut grid[row_idx];
                            if row.len() <= done.column {
                                row.resize(done.column + 1, CellValue::Empty);
                            }
                            row[done.column] = value;
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(grid)
}
