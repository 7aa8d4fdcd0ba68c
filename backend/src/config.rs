//! Pipeline configuration.
//!
//! All knobs are explicit values handed to the pipelines; nothing is read
//! from ambient state. A config file is JSON in camelCase, every field
//! optional:
//!
//! ```json
//! {
//!   "artwork": { "sheetName": "general_report", "headerRow": 1, "roundingPrecision": 1 },
//!   "stock": { "topLocations": 5 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::parser::LoadOptions;
use crate::transform::artwork::{default_category_rules, CategoryRule};
use crate::transform::columns::{ArtworkColumns, StockColumns};
use crate::transform::stats::{RoundingPrecision, StatsOptions, DEFAULT_BEYOND_THRESHOLD};
use crate::transform::stock::DEFAULT_TOP_LOCATIONS;

/// Sheet the artwork export lands on.
pub const DEFAULT_ARTWORK_SHEET: &str = "general_report";

/// Environment variable naming a config file for the CLI.
pub const CONFIG_ENV_VAR: &str = "KPILOAD_CONFIG";

/// Settings for the artwork pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArtworkConfig {
    /// `None` reads the first sheet.
    pub sheet_name: Option<String>,
    /// Zero-based row holding the headers.
    pub header_row: usize,
    pub versions_column: String,
    pub pos_code_column: String,
    pub category_column: String,
    pub description_column: String,
    pub beyond_threshold: i64,
    pub rounding_precision: RoundingPrecision,
    pub category_rules: Vec<CategoryRule>,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            sheet_name: Some(DEFAULT_ARTWORK_SHEET.to_string()),
            header_row: 0,
            versions_column: "Client Versions".to_string(),
            pos_code_column: "POS Code".to_string(),
            category_column: "Category".to_string(),
            description_column: "Project Description".to_string(),
            beyond_threshold: DEFAULT_BEYOND_THRESHOLD,
            rounding_precision: RoundingPrecision::default(),
            category_rules: default_category_rules(),
        }
    }
}

impl ArtworkConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sheet_name: self.sheet_name.clone(),
            header_row: self.header_row,
        }
    }

    pub fn columns(&self) -> ArtworkColumns<'_> {
        ArtworkColumns {
            versions: &self.versions_column,
            pos_code: &self.pos_code_column,
            category: &self.category_column,
            description: &self.description_column,
        }
    }

    pub fn stats_options(&self) -> StatsOptions {
        StatsOptions {
            beyond_threshold: self.beyond_threshold,
            rounding_precision: self.rounding_precision,
        }
    }
}

/// Settings for the stock pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StockConfig {
    pub sheet_name: Option<String>,
    pub header_row: usize,
    pub ordered_by_column: String,
    pub order_number_column: String,
    pub location_code_column: String,
    pub location_name_column: String,
    /// Substring (case-insensitive) marking an order as raised by a store.
    pub store_marker: String,
    pub top_locations: usize,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            sheet_name: None,
            header_row: 0,
            ordered_by_column: "Ordered By".to_string(),
            order_number_column: "Order Number".to_string(),
            location_code_column: "Location Code".to_string(),
            location_name_column: "Location Name".to_string(),
            store_marker: "store".to_string(),
            top_locations: DEFAULT_TOP_LOCATIONS,
        }
    }
}

impl StockConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sheet_name: self.sheet_name.clone(),
            header_row: self.header_row,
        }
    }

    pub fn columns(&self) -> StockColumns<'_> {
        StockColumns {
            ordered_by: &self.ordered_by_column,
            order_number: &self.order_number_column,
            location_code: &self.location_code_column,
            location_name: &self.location_name_column,
        }
    }
}

/// Both pipelines' settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub artwork: ArtworkConfig,
    pub stock: StockConfig,
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Loads `path` when given, else the file named by [`CONFIG_ENV_VAR`],
    /// else the defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => match std::env::var_os(CONFIG_ENV_VAR) {
                Some(p) => Self::load(Path::new(&p)),
                None => Ok(Self::default()),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stock.store_marker.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "stock.storeMarker".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.artwork.versions_column.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "artwork.versionsColumn".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.artwork.sheet_name.as_deref(), Some("general_report"));
        assert_eq!(config.artwork.beyond_threshold, 3);
        assert_eq!(config.artwork.category_rules.len(), 3);
        assert_eq!(config.stock.sheet_name, None);
        assert_eq!(config.stock.top_locations, 10);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{ "artwork": { "headerRow": 1, "roundingPrecision": 1 }, "stock": { "topLocations": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.artwork.header_row, 1);
        assert_eq!(config.artwork.rounding_precision, RoundingPrecision::One);
        assert_eq!(config.artwork.versions_column, "Client Versions");
        assert_eq!(config.stock.top_locations, 5);
        assert_eq!(config.stock.store_marker, "store");
    }

    #[test]
    fn test_bad_precision_rejected() {
        let err = AppConfig::from_json(r#"{ "artwork": { "roundingPrecision": 4 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_empty_marker_rejected() {
        let err = AppConfig::from_json(r#"{ "stock": { "storeMarker": " " } }"#).unwrap_err();
        assert!(err.to_string().contains("stock.storeMarker"));
    }

    #[test]
    fn test_json_round_trip() {
        let config = AppConfig::default();
        let back = AppConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "artwork": {{ "sheetName": null }} }}"#).unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.artwork.sheet_name, None);
    }
}
