//! # Kpiload - artwork and stock KPIs from spreadsheet exports
//!
//! Kpiload cleans the artwork production report exported by the studio
//! tracker (`general_report` sheet) and turns it into right-first-time and
//! amend KPIs. A second pipeline classifies stock orders by who raised them
//! and ranks the busiest locations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ XLSX / CSV  │────▶│   Parser    │────▶│  Transform  │────▶│ JSON / XLSX │
//! │  (upload)   │     │ (sniffed)   │     │ (clean+KPI) │     │  (report)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kpiload::{run_artwork_file, ArtworkConfig};
//! use std::path::Path;
//!
//! let report = run_artwork_file(Path::new("general_report.xlsx"), &ArtworkConfig::default())?;
//! println!("{} new artworks", report.summary.total_records);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, datasets, artwork records, order types
//! - [`parser`] - Workbook and CSV loading
//! - [`transform`] - Column resolution, cleaning, aggregation, pipelines
//! - [`export`] - `.xlsx` report writing
//! - [`config`] - JSON configuration
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod error;
pub mod models;
pub mod config;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    error_chain,
    ConfigError,
    ExportError,
    LoadError,
    PipelineError,
    ServerError,
    StatsError,
    TransformError,
};

// =============================================================================
// Re-exports - Models & config
// =============================================================================

pub use models::{ArtworkRecord, ArtworkTable, CellValue, Dataset, OrderType};
pub use config::{AppConfig, ArtworkConfig, StockConfig};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use parser::{list_sheets, load_bytes, load_file, LoadOptions, LoadedTable, SourceFormat, SourceInfo};

// =============================================================================
// Re-exports - Pipelines
// =============================================================================

pub use transform::{
    run_artwork,
    run_artwork_file,
    run_stock,
    run_stock_file,
    ArtworkReport,
    StatsSummary,
    StockReport,
    StockRun,
};

// =============================================================================
// Re-exports - Export & API
// =============================================================================

pub use export::{artwork_sheets, stock_sheets, write_workbook, Sheet};

pub use api::types::{error_response, ArtworkResponse, SheetsResponse, StockResponse};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
