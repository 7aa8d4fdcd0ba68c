//! Column resolution.
//!
//! Upstream exports do not keep header capitalization or spacing stable, so
//! required columns are looked up by logical name (trimmed, case-folded) once,
//! before any transform runs. Engines then index rows through the resolved
//! schema instead of re-matching header strings per access.

use serde::Serialize;

use crate::error::TransformError;
use crate::models::CellValue;

static EMPTY_CELL: CellValue = CellValue::Empty;

/// A logical column matched against the sheet headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    /// Header string exactly as it appears in the sheet.
    pub name: String,
    /// Zero-based position in the row.
    pub index: usize,
}

impl ResolvedColumn {
    /// This column's cell in `row`; a short row reads as empty.
    pub fn cell<'r>(&self, row: &'r [CellValue]) -> &'r CellValue {
        row.get(self.index).unwrap_or(&EMPTY_CELL)
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Finds the header whose trimmed, case-folded form equals `logical`.
///
/// The first matching header wins when a sheet repeats a column name.
pub fn resolve_column(headers: &[String], logical: &str) -> Result<ResolvedColumn, TransformError> {
    let wanted = fold(logical);
    headers
        .iter()
        .position(|h| fold(h) == wanted)
        .map(|index| ResolvedColumn {
            name: headers[index].clone(),
            index,
        })
        .ok_or_else(|| TransformError::MissingColumn {
            column: logical.to_string(),
            available: headers.to_vec(),
        })
}

/// Like [`resolve_column`] but absence is not an error.
pub fn resolve_optional(headers: &[String], logical: &str) -> Option<ResolvedColumn> {
    resolve_column(headers, logical).ok()
}

// =============================================================================
// Artwork schema
// =============================================================================

/// Logical names of the artwork columns.
#[derive(Debug, Clone)]
pub struct ArtworkColumns<'a> {
    pub versions: &'a str,
    pub pos_code: &'a str,
    pub category: &'a str,
    pub description: &'a str,
}

/// Physical columns backing an artwork sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkSchema {
    pub client_versions: ResolvedColumn,
    pub pos_code: ResolvedColumn,
    pub category: ResolvedColumn,
    /// Optional: without it no description-based rule can match.
    pub project_description: Option<ResolvedColumn>,
}

impl ArtworkSchema {
    /// Resolves the versions column first so that a missing versions column
    /// is always the error reported, whatever else is absent.
    pub fn resolve(headers: &[String], names: &ArtworkColumns<'_>) -> Result<Self, TransformError> {
        let client_versions = resolve_column(headers, names.versions)?;
        let pos_code = resolve_column(headers, names.pos_code)?;
        let category = resolve_column(headers, names.category)?;
        let project_description = resolve_optional(headers, names.description);

        Ok(Self {
            client_versions,
            pos_code,
            category,
            project_description,
        })
    }
}

// =============================================================================
// Stock schema
// =============================================================================

/// Logical names of the stock columns.
#[derive(Debug, Clone)]
pub struct StockColumns<'a> {
    pub ordered_by: &'a str,
    pub order_number: &'a str,
    pub location_code: &'a str,
    pub location_name: &'a str,
}

/// Physical columns backing a stock sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSchema {
    pub ordered_by: ResolvedColumn,
    pub order_number: ResolvedColumn,
    pub location_code: ResolvedColumn,
    pub location_name: ResolvedColumn,
}

impl StockSchema {
    pub fn resolve(headers: &[String], names: &StockColumns<'_>) -> Result<Self, TransformError> {
        Ok(Self {
            ordered_by: resolve_column(headers, names.ordered_by)?,
            order_number: resolve_column(headers, names.order_number)?,
            location_code: resolve_column(headers, names.location_code)?,
            location_name: resolve_column(headers, names.location_name)?,
        })
    }
}
