//! Error types for the Kpiload pipelines.
//!
//! Each stage owns its error enum:
//!
//! - [`LoadError`] - workbook / CSV loading errors
//! - [`TransformError`] - column resolution and value conversion errors
//! - [`StatsError`] - aggregation errors
//! - [`ExportError`] - workbook writing errors
//! - [`ConfigError`] - configuration file errors
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries. Use [`error_chain`]
//! to flatten an error and all of its causes for display.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while reading an uploaded workbook or CSV file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The upload looked like a workbook but is not a readable ZIP archive.
    #[error("workbook archive is unreadable")]
    Archive(#[from] zip::result::ZipError),

    /// A workbook part could not be read or parsed.
    #[error("workbook part '{part}' is malformed: {message}")]
    Xml { part: String, message: String },

    /// The requested sheet does not exist.
    #[error("sheet '{sheet}' not found (available: {})", .available.join(", "))]
    SheetNotFound { sheet: String, available: Vec<String> },

    /// The header row offset points past the end of the sheet.
    #[error("header row {header_row} is out of range (sheet has {rows} rows)")]
    HeaderRowOutOfRange { header_row: usize, rows: usize },

    /// Invalid CSV content.
    #[error("invalid CSV content")]
    Csv(#[from] csv::Error),

    /// Empty upload.
    #[error("uploaded file is empty")]
    EmptyFile,
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised by the column resolver and the transform engines.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Required column absent after case-insensitive, trimmed matching.
    #[error("missing required column '{column}' (found: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// A value that must be numeric could not be converted.
    #[error("row {row}, column '{column}': cannot convert '{value}' to a whole number")]
    TypeConversion {
        column: String,
        row: usize,
        value: String,
    },
}

// =============================================================================
// Aggregation Errors
// =============================================================================

/// Errors raised by the aggregator.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Nothing left to aggregate after cleaning.
    #[error("no records left after cleaning; statistics need at least one row")]
    EmptyDataset,

    /// A running total left the `i64` range.
    #[error("{field} overflowed while summing")]
    Overflow { field: String },
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while producing the downloadable workbook.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The xlsx writer rejected the workbook.
    #[error("xlsx write error")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// A sheet grid does not fit in a worksheet.
    #[error("sheet '{sheet}' exceeds worksheet limits at row {row}, column {column}")]
    OutOfBounds {
        sheet: String,
        row: usize,
        column: usize,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`crate::config::AppConfig`].
    #[error("invalid config JSON")]
    Json(#[from] serde_json::Error),

    /// A field holds a value outside its allowed set.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_artwork`]
/// and [`crate::transform::pipeline::run_stock`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading error.
    #[error("could not load the upload")]
    Load(#[from] LoadError),

    /// Transformation error.
    #[error("could not clean the data")]
    Transform(#[from] TransformError),

    /// Aggregation error.
    #[error("could not compute statistics")]
    Stats(#[from] StatsError),

    /// Export error.
    #[error("could not build the workbook")]
    Export(#[from] ExportError),
}

impl PipelineError {
    /// True when the operator must fix the spreadsheet (as opposed to an
    /// unreadable upload or an internal failure).
    pub fn is_data_problem(&self) -> bool {
        matches!(self, PipelineError::Transform(_) | PipelineError::Stats(_))
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("pipeline error")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Failed to bind or serve.
    #[error("server I/O error")]
    Io(#[from] std::io::Error),
}

/// Flattens an error and its `source()` chain into display strings,
/// outermost first.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut current = err.source();
    while let Some(cause) = current {
        chain.push(cause.to_string());
        current = cause.source();
    }
    chain
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let transform_err = TransformError::MissingColumn {
            column: "Client Versions".into(),
            available: vec!["POS Code".into(), "Category".into()],
        };
        let pipeline_err: PipelineError = transform_err.into();
        assert!(pipeline_err.is_data_problem());

        let chain = error_chain(&pipeline_err);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], "could not clean the data");
        assert!(chain[1].contains("'Client Versions'"));
        assert!(chain[1].contains("POS Code, Category"));
    }

    #[test]
    fn test_type_conversion_format() {
        let err = TransformError::TypeConversion {
            column: "Client Versions".into(),
            row: 7,
            value: "three".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("row 7"));
        assert!(msg.contains("'three'"));
    }

    #[test]
    fn test_load_errors_are_not_data_problems() {
        let err: PipelineError = LoadError::EmptyFile.into();
        assert!(!err.is_data_problem());
        assert_eq!(error_chain(&err).last().unwrap(), "uploaded file is empty");
    }

    #[test]
    fn test_sheet_not_found_lists_sheets() {
        let err = LoadError::SheetNotFound {
            sheet: "general_report".into(),
            available: vec!["Sheet1".into(), "Export".into()],
        };
        assert_eq!(
            err.to_string(),
            "sheet 'general_report' not found (available: Sheet1, Export)"
        );
    }
}
