//! Transformation module.
//!
//! - Columns: logical column name resolution
//! - Artwork: cleaning, derived fields and category rules
//! - Stats: KPI aggregation
//! - Stock: order classification and location ranking
//! - Pipeline: load-to-report orchestration

pub mod artwork;
pub mod columns;
pub mod pipeline;
pub mod stats;
pub mod stock;

pub use artwork::{default_category_rules, transform_artwork, CategoryRule, RuleCondition};
pub use columns::{resolve_column, ArtworkColumns, ArtworkSchema, ResolvedColumn, StockColumns, StockSchema};
pub use pipeline::{run_artwork, run_artwork_file, run_stock, run_stock_file, ArtworkReport, StockRun};
pub use stats::{summarize, RoundingPrecision, StatsOptions, StatsSummary};
pub use stock::{classify, transform_stock, StockReport};
