//! Downloadable `.xlsx` reports.
//!
//! Reports are first flattened into [`Sheet`]s (plain grids, also handy for
//! JSON consumers), then written with `rust_xlsxwriter`.

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::Serialize;

use crate::error::ExportError;
use crate::models::{CellValue, Dataset, MAX_SHEET_COLS, MAX_SHEET_ROWS};
use crate::transform::pipeline::ArtworkReport;
use crate::transform::stock::StockReport;

/// One worksheet's worth of cells. `rows` may be ragged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_dataset(name: &str, dataset: &Dataset) -> Self {
        Self {
            name: name.to_string(),
            columns: dataset.columns.clone(),
            rows: dataset.rows.clone(),
        }
    }

    fn push(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }
}

/// Summary, version breakdown and cleaned data for an artwork run.
pub fn artwork_sheets(report: &ArtworkReport) -> Vec<Sheet> {
    let s = &report.summary;

    let mut summary = Sheet::new("Summary", &["Metric", "Value"]);
    summary.push(vec!["New Artworks".into(), s.total_records.into()]);
    summary.push(vec!["Total Amends".into(), s.total_amends.into()]);
    summary.push(vec!["Right First Time".into(), s.right_first_time_count.into()]);
    summary.push(vec!["Right First Time %".into(), s.right_first_time_percent.into()]);
    summary.push(vec!["Average Amend Rate".into(), s.average_amend_rate.into()]);
    summary.push(vec![
        format!("Beyond {} Versions", s.beyond_threshold).into(),
        s.beyond_threshold_count.into(),
    ]);
    summary.push(vec![
        format!("Beyond {} Versions %", s.beyond_threshold).into(),
        s.beyond_threshold_percent.into(),
    ]);
    if s.uncategorized_count > 0 {
        summary.push(vec!["Uncategorized".into(), s.uncategorized_count.into()]);
    }

    summary.push(Vec::new());
    summary.push(
        ["Category", "Artworks", "Amends", "Right First Time", "Average Amends"]
            .iter()
            .map(|h| CellValue::from(*h))
            .collect(),
    );
    for c in &s.categories {
        summary.push(vec![
            c.category.as_str().into(),
            c.count.into(),
            c.amends.into(),
            c.right_first_time.into(),
            c.average_amends.into(),
        ]);
    }

    let mut versions = Sheet::new("Version Breakdown", &["Client Versions", "Artworks"]);
    for v in &s.versions {
        versions.push(vec![v.versions.into(), v.count.into()]);
    }

    vec![
        summary,
        versions,
        Sheet::from_dataset("Cleaned Data", &report.cleaned.to_dataset()),
    ]
}

/// Order type counts, busiest locations and classified rows for a stock run.
pub fn stock_sheets(report: &StockReport) -> Vec<Sheet> {
    let mut order_types = Sheet::new("Order Types", &["Order Type", "Unique Orders"]);
    for t in &report.order_types {
        order_types.push(vec![t.order_type.label().into(), t.unique_orders.into()]);
    }

    let mut locations = Sheet::new("Top Locations", &["Location Code", "Location Name", "Order Lines"]);
    for l in &report.top_locations {
        locations.push(vec![
            l.location_code.as_str().into(),
            l.location_name.as_str().into(),
            l.order_lines.into(),
        ]);
    }

    vec![
        order_types,
        locations,
        Sheet::from_dataset("Classified Orders", &report.classified),
    ]
}

/// Writes `sheets` into an in-memory workbook.
pub fn write_workbook(sheets: &[Sheet]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in sheets {
        check_bounds(sheet)?;
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, name) in sheet.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, name, &header_format)?;
        }
        for (r, row) in sheet.rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                write_cell(worksheet, r as u32 + 1, col as u16, cell)?;
            }
        }
        if !sheet.columns.is_empty() {
            worksheet.set_freeze_panes(1, 0)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn check_bounds(sheet: &Sheet) -> Result<(), ExportError> {
    // +1 for the header row.
    let rows = sheet.rows.len() + 1;
    let cols = sheet
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(sheet.columns.len()))
        .max()
        .unwrap_or(0);
    if rows > MAX_SHEET_ROWS || cols > MAX_SHEET_COLS {
        return Err(ExportError::OutOfBounds {
            sheet: sheet.name.clone(),
            row: rows,
            column: cols,
        });
    }
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &CellValue) -> Result<(), ExportError> {
    match cell {
        CellValue::Empty => {}
        CellValue::Text(s) => {
            worksheet.write_string(row, col, s)?;
        }
        CellValue::Number(n) => {
            worksheet.write_number(row, col, *n)?;
        }
        CellValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
    }
    Ok(())
}
