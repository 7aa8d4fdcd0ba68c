//! End-to-end pipelines: load, resolve, clean, aggregate.
//!
//! Both pipelines are synchronous and CPU-bound; the HTTP layer runs them on
//! the blocking pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use kpiload::config::ArtworkConfig;
//! use kpiload::transform::pipeline::run_artwork_file;
//! use std::path::Path;
//!
//! let report = run_artwork_file(Path::new("general_report.xlsx"), &ArtworkConfig::default())?;
//! println!("{} artworks, {}% right first time",
//!     report.summary.total_records, report.summary.right_first_time_percent);
//! ```

use std::path::Path;

use serde::Serialize;

use super::artwork::transform_artwork;
use super::stats::{summarize, StatsSummary};
use super::stock::{transform_stock, StockReport};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::config::{ArtworkConfig, StockConfig};
use crate::error::{LoadError, PipelineResult};
use crate::models::ArtworkTable;
use crate::parser::{load_bytes, LoadedTable, SourceFormat, SourceInfo};

/// Result of the artwork pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkReport {
    pub source: SourceInfo,
    pub cleaned: ArtworkTable,
    pub summary: StatsSummary,
}

/// Result of the stock pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRun {
    pub source: SourceInfo,
    pub report: StockReport,
}

fn describe_source(table: &LoadedTable) {
    let source = &table.source;
    match source.format {
        SourceFormat::Xlsx => log_success(format!(
            "Read sheet '{}' of {}: {} rows",
            source.sheet, source.file_name, source.row_count
        )),
        SourceFormat::Csv => log_success(format!(
            "Read {} as CSV ({}, '{}'): {} rows",
            source.file_name,
            source.encoding.as_deref().unwrap_or("unknown"),
            source.delimiter.map(format_delimiter).unwrap_or_default(),
            source.row_count
        )),
    }
    log_info(format!("📋 {} columns:", source.columns.len()));
    for (i, col) in source.columns.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }
}

fn format_delimiter(c: char) -> String {
    match c {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

/// Runs the artwork pipeline over an uploaded payload.
pub fn run_artwork(bytes: &[u8], file_name: &str, config: &ArtworkConfig) -> PipelineResult<ArtworkReport> {
    log_info(format!("📖 Loading {}...", file_name));
    let table = load_bytes(bytes, file_name, &config.load_options())?;
    describe_source(&table);

    log_info("🔄 Cleaning artwork rows...");
    let cleaned = transform_artwork(&table.dataset, &config.columns(), &config.category_rules, config.header_row)?;
    let dropped = table.dataset.len() - cleaned.len();
    if dropped > 0 {
        log_info_indent(format!("{} duplicate or zero-version rows removed", dropped), 1);
    }
    if cleaned.schema.project_description.is_none() {
        log_warning(format!(
            "No '{}' column; description rules will not fire",
            config.description_column
        ));
    }
    log_success(format!("{} artworks after cleaning", cleaned.len()));

    log_info("📊 Computing KPIs...");
    let summary = summarize(&cleaned, &config.stats_options())?;
    log_success(format!(
        "{}% right first time, {} average amends",
        summary.right_first_time_percent, summary.average_amend_rate
    ));

    Ok(ArtworkReport {
        source: table.source,
        cleaned,
        summary,
    })
}

/// Reads `path` and runs [`run_artwork`].
pub fn run_artwork_file(path: &Path, config: &ArtworkConfig) -> PipelineResult<ArtworkReport> {
    let (bytes, name) = read_upload(path)?;
    run_artwork(&bytes, &name, config)
}

/// Runs the stock pipeline over an uploaded payload.
pub fn run_stock(bytes: &[u8], file_name: &str, config: &StockConfig) -> PipelineResult<StockRun> {
    log_info(format!("📖 Loading {}...", file_name));
    let table = load_bytes(bytes, file_name, &config.load_options())?;
    describe_source(&table);

    log_info("🔄 Classifying orders...");
    let report = transform_stock(
        &table.dataset,
        &config.columns(),
        &config.store_marker,
        config.top_locations,
    )?;
    for count in &report.order_types {
        log_info_indent(format!("{}: {} unique orders", count.order_type, count.unique_orders), 1);
    }
    log_success(format!("{} busiest locations ranked", report.top_locations.len()));

    Ok(StockRun {
        source: table.source,
        report,
    })
}

/// Reads `path` and runs [`run_stock`].
pub fn run_stock_file(path: &Path, config: &StockConfig) -> PipelineResult<StockRun> {
    let (bytes, name) = read_upload(path)?;
    run_stock(&bytes, &name, config)
}

fn read_upload(path: &Path) -> Result<(Vec<u8>, String), LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((bytes, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, StatsError, TransformError};
    use crate::models::OrderType;
    use rust_xlsxwriter::Workbook;
    use std::io::Write;

    fn artwork_workbook(rows: &[(&str, f64, &str, &str)]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("general_report").unwrap();
        for (col, header) in ["POS Code", "Client Versions", "Category", "Project Description"]
            .iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        for (i, (pos, versions, category, description)) in rows.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, *pos).unwrap();
            sheet.write_number(row, 1, *versions).unwrap();
            sheet.write_string(row, 2, *category).unwrap();
            sheet.write_string(row, 3, *description).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_artwork_end_to_end() {
        let bytes = artwork_workbook(&[
            ("A", 3.0, "Members", "ROI campaign"),
            ("A", 1.0, "Members", ""),
            ("B", 0.0, "Mobile", ""),
            ("C", 1.0, "Starbuys", "Spring"),
        ]);
        let report = run_artwork(&bytes, "report.xlsx", &ArtworkConfig::default()).unwrap();

        assert_eq!(report.source.sheet, "general_report");
        assert_eq!(report.summary.total_records, 2);
        assert_eq!(report.summary.total_amends, 2);
        assert_eq!(report.summary.right_first_time_count, 1);
        assert_eq!(report.summary.right_first_time_percent, 50.0);
        let categories: Vec<&str> = report
            .summary
            .categories
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        assert_eq!(categories, vec!["Main Event", "ROI"]);
    }

    #[test]
    fn test_artwork_missing_column_is_data_problem() {
        let bytes = b"POS Code,Category\nA,Members\n";
        let config = ArtworkConfig {
            sheet_name: None,
            ..ArtworkConfig::default()
        };
        let err = run_artwork(bytes, "report.csv", &config).unwrap_err();
        assert!(err.is_data_problem());
        assert!(matches!(
            err,
            PipelineError::Transform(TransformError::MissingColumn { ref column, .. }) if column == "Client Versions"
        ));
    }

    #[test]
    fn test_conversion_error_reports_sheet_row_past_blank_lines() {
        let bytes = b"POS Code,Client Versions,Category\nA,1,Core\n,,\nB,oops,Core\n";
        let err = run_artwork(bytes, "report.csv", &ArtworkConfig::default()).unwrap_err();
        match err {
            PipelineError::Transform(TransformError::TypeConversion { row, value, .. }) => {
                assert_eq!(row, 4);
                assert_eq!(value, "oops");
            }
            other => panic!("expected TypeConversion, got {:?}", other),
        }
    }

    #[test]
    fn test_artwork_all_zero_versions() {
        let bytes = b"POS Code,Client Versions,Category\nA,0,Members\nB,0,Mobile\n";
        let err = run_artwork(bytes, "report.csv", &ArtworkConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Stats(StatsError::EmptyDataset)));
    }

    #[test]
    fn test_artwork_wrong_sheet_is_load_error() {
        let bytes = artwork_workbook(&[("A", 1.0, "Core", "")]);
        let config = ArtworkConfig {
            sheet_name: Some("Sheet1".into()),
            ..ArtworkConfig::default()
        };
        let err = run_artwork(&bytes, "report.xlsx", &config).unwrap_err();
        assert!(matches!(err, PipelineError::Load(LoadError::SheetNotFound { .. })));
        assert!(!err.is_data_problem());
    }

    #[test]
    fn test_stock_from_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Ordered By;Order Number;Location Code;Location Name").unwrap();
        writeln!(file, "Store 4;100;S4;Market Sq").unwrap();
        writeln!(file, "Store 4;100;S4;Market Sq").unwrap();
        writeln!(file, "Helpdesk;200;S9;Harbour").unwrap();

        let run = run_stock_file(file.path(), &StockConfig::default()).unwrap();
        assert_eq!(run.source.row_count, 3);
        assert_eq!(run.report.order_types[0].order_type, OrderType::Store);
        assert_eq!(run.report.order_types[0].unique_orders, 1);
        assert_eq!(run.report.order_types[1].unique_orders, 1);
        assert_eq!(run.report.top_locations[0].location_code, "S4");
        assert_eq!(run.report.top_locations[0].order_lines, 2);
    }

    #[test]
    fn test_artwork_missing_file() {
        let err = run_artwork_file(Path::new("/no/such/report.xlsx"), &ArtworkConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Load(LoadError::Io { .. })));
    }
}
