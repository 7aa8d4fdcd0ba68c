//! Domain models shared by the loaders, engines and exporters.
//!
//! - [`CellValue`] - a single spreadsheet cell
//! - [`Dataset`] - a rectangular table with literal header strings
//! - [`ArtworkRecord`] / [`ArtworkTable`] - typed view produced by the artwork engine
//! - [`OrderType`] - stock order classification

use serde::{Deserialize, Serialize};

use crate::transform::columns::ArtworkSchema;

// =============================================================================
// Cells
// =============================================================================

/// A single cell as read from a sheet.
///
/// Serialized untagged: `null`, a string, a number or a boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Builds a text cell, mapping blank strings to [`CellValue::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Printed form of the cell, or `None` when blank.
    ///
    /// Whole numbers print without a fractional part, so a POS code read as
    /// the number `1042` and one read as the text `"1042"` compare equal.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) if s.trim().is_empty() => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            CellValue::Number(n) => Some(format_number(*n)),
        }
    }

    /// Reads the cell as a whole number.
    ///
    /// Text holding a whole number (surrounding whitespace allowed) is accepted.
    /// Magnitudes beyond [`MAX_WHOLE_NUMBER`] are rejected rather than saturated.
    pub fn as_whole_number(&self) -> Option<i64> {
        let value = match self {
            CellValue::Number(n) => whole_from_f64(*n),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_from_f64))
            }
            _ => None,
        }?;
        (value.checked_abs()? <= MAX_WHOLE_NUMBER).then_some(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

/// Largest magnitude [`CellValue::as_whole_number`] accepts: every integer up
/// to it is exact in an `f64`.
pub const MAX_WHOLE_NUMBER: i64 = 1 << 53;

fn whole_from_f64(n: f64) -> Option<i64> {
    (n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_WHOLE_NUMBER as f64).then_some(n as i64)
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Excel's hard worksheet limits.
pub const MAX_SHEET_ROWS: usize = 1_048_576;
pub const MAX_SHEET_COLS: usize = 16_384;

/// An ordered sequence of rows sharing one column set.
///
/// Rows built through [`Dataset::new`] have exactly `columns.len()` cells;
/// readers still treat missing trailing cells as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Literal header strings, as found in the sheet.
    pub columns: Vec<String>,
    /// Data rows.
    pub rows: Vec<Vec<CellValue>>,
    /// Zero-based sheet row each data row was read from. Empty when the
    /// dataset was not loaded from a sheet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_rows: Vec<usize>,
}

impl Dataset {
    /// Creates a dataset, padding or truncating each row to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self {
            columns,
            rows,
            source_rows: Vec::new(),
        }
    }

    /// Records the sheet row of each data row.
    pub fn with_source_rows(mut self, source_rows: Vec<usize>) -> Self {
        self.source_rows = source_rows;
        self
    }

    /// 1-based spreadsheet row number of data row `idx`, when known.
    pub fn sheet_row_number(&self, idx: usize) -> Option<usize> {
        self.source_rows.get(idx).map(|r| r + 1)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column whose header is exactly `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns a copy with `name` set on every row from `values`.
    ///
    /// An existing column with that exact header is overwritten in place,
    /// otherwise the column is appended.
    pub fn with_column(mut self, name: &str, values: Vec<CellValue>) -> Self {
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        };
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, CellValue::Empty);
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = value;
        }
        self
    }
}

// =============================================================================
// Artwork
// =============================================================================

/// Name of the derived amends column.
pub const AMENDS_COLUMN: &str = "Amends";
/// Name of the derived right-first-time column.
pub const RIGHT_FIRST_TIME_COLUMN: &str = "Right First Time";

/// One surviving artwork row after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkRecord {
    /// Zero-based index of the row in the uploaded dataset.
    pub source_row: usize,
    pub pos_code: Option<String>,
    pub client_versions: i64,
    pub project_description: Option<String>,
    pub category: Option<String>,
    /// `client_versions - 1`.
    pub amends: i64,
    /// True iff `client_versions == 1`.
    pub right_first_time: bool,
    /// Original cells, passed through untouched.
    #[serde(skip)]
    pub cells: Vec<CellValue>,
}

/// Cleaned artwork data: typed records plus the column layout they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkTable {
    pub columns: Vec<String>,
    pub schema: ArtworkSchema,
    pub records: Vec<ArtworkRecord>,
}

impl ArtworkTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders the cleaned records back into a [`Dataset`] with the rewritten
    /// category and the derived `Amends` / `Right First Time` columns.
    pub fn to_dataset(&self) -> Dataset {
        let category_index = self.schema.category.index;
        let rows = self
            .records
            .iter()
            .map(|record| {
                let mut cells = record.cells.clone();
                cells[category_index] = CellValue::from(record.category.clone());
                cells
            })
            .collect();

        let amends = self.records.iter().map(|r| CellValue::from(r.amends)).collect();
        let rft = self
            .records
            .iter()
            .map(|r| CellValue::Bool(r.right_first_time))
            .collect();

        Dataset::new(self.columns.clone(), rows)
            .with_column(AMENDS_COLUMN, amends)
            .with_column(RIGHT_FIRST_TIME_COLUMN, rft)
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Who raised a stock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "Store Order")]
    Store,
    #[serde(rename = "Helpdesk Order")]
    Helpdesk,
}

impl OrderType {
    pub const ALL: [OrderType; 2] = [OrderType::Store, OrderType::Helpdesk];

    pub fn label(&self) -> &'static str {
        match self {
            OrderType::Store => "Store Order",
            OrderType::Helpdesk => "Helpdesk Order",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
