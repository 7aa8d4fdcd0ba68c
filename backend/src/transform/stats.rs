//! KPI aggregation over a cleaned artwork table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::models::ArtworkTable;

/// Default version cutoff above which an artwork counts as high rework.
pub const DEFAULT_BEYOND_THRESHOLD: i64 = 3;

/// Decimal places used for percentage KPIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RoundingPrecision {
    One,
    #[default]
    Two,
}

impl RoundingPrecision {
    pub fn places(self) -> u8 {
        match self {
            RoundingPrecision::One => 1,
            RoundingPrecision::Two => 2,
        }
    }

    /// Rounds half away from zero to this many decimal places.
    pub fn round(self, value: f64) -> f64 {
        round_to(value, self.places())
    }
}

impl TryFrom<u8> for RoundingPrecision {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RoundingPrecision::One),
            2 => Ok(RoundingPrecision::Two),
            other => Err(format!("rounding precision must be 1 or 2, got {}", other)),
        }
    }
}

impl From<RoundingPrecision> for u8 {
    fn from(value: RoundingPrecision) -> Self {
        value.places()
    }
}

impl FromStr for RoundingPrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "one" => Ok(RoundingPrecision::One),
            "2" | "two" => Ok(RoundingPrecision::Two),
            other => Err(format!("rounding precision must be 1 or 2, got '{}'", other)),
        }
    }
}

impl fmt::Display for RoundingPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.places())
    }
}

fn round_to(value: f64, places: u8) -> f64 {
    let factor = 10_f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Aggregation knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsOptions {
    /// Records with `client_versions > beyond_threshold` count as beyond threshold.
    pub beyond_threshold: i64,
    pub rounding_precision: RoundingPrecision,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            beyond_threshold: DEFAULT_BEYOND_THRESHOLD,
            rounding_precision: RoundingPrecision::default(),
        }
    }
}

/// Per-category figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: String,
    pub count: usize,
    pub amends: i64,
    pub right_first_time: usize,
    pub average_amends: f64,
}

/// Number of records sharing one version count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCount {
    pub versions: i64,
    pub count: usize,
}

/// Everything the status report needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_records: usize,
    pub total_amends: i64,
    pub right_first_time_count: usize,
    pub right_first_time_percent: f64,
    pub average_amend_rate: f64,
    pub beyond_threshold: i64,
    pub beyond_threshold_count: usize,
    pub beyond_threshold_percent: f64,
    /// Records whose category is blank; they are left out of `categories`.
    pub uncategorized_count: usize,
    /// Sorted by category name.
    pub categories: Vec<CategoryStats>,
    /// Sorted by version count, ascending.
    pub versions: Vec<VersionCount>,
}

#[derive(Default)]
struct CategoryAcc {
    count: usize,
    amends: i64,
    right_first_time: usize,
}

fn add_checked(total: i64, value: i64, field: &str) -> Result<i64, StatsError> {
    total.checked_add(value).ok_or_else(|| StatsError::Overflow {
        field: field.to_string(),
    })
}

/// Computes the summary for a cleaned table.
pub fn summarize(table: &ArtworkTable, options: &StatsOptions) -> Result<StatsSummary, StatsError> {
    let total = table.len();
    if total == 0 {
        return Err(StatsError::EmptyDataset);
    }

    let mut total_amends = 0_i64;
    let mut rft = 0_usize;
    let mut beyond = 0_usize;
    let mut uncategorized = 0_usize;
    let mut by_category: BTreeMap<&str, CategoryAcc> = BTreeMap::new();
    let mut by_versions: BTreeMap<i64, usize> = BTreeMap::new();

    for record in &table.records {
        total_amends = add_checked(total_amends, record.amends, "total amends")?;
        if record.right_first_time {
            rft += 1;
        }
        if record.client_versions > options.beyond_threshold {
            beyond += 1;
        }
        *by_versions.entry(record.client_versions).or_default() += 1;

        match record.category.as_deref() {
            Some(category) => {
                let acc = by_category.entry(category).or_default();
                acc.count += 1;
                acc.amends = add_checked(acc.amends, record.amends, "category amends")?;
                if record.right_first_time {
                    acc.right_first_time += 1;
                }
            }
            None => uncategorized += 1,
        }
    }

    let percent = |n: usize| options.rounding_precision.round(n as f64 / total as f64 * 100.0);

    let categories = by_category
        .into_iter()
        .map(|(category, acc)| CategoryStats {
            category: category.to_string(),
            count: acc.count,
            amends: acc.amends,
            right_first_time: acc.right_first_time,
            average_amends: round_to(acc.amends as f64 / acc.count as f64, 2),
        })
        .collect();

    let versions = by_versions
        .into_iter()
        .map(|(versions, count)| VersionCount { versions, count })
        .collect();

    Ok(StatsSummary {
        total_records: total,
        total_amends,
        right_first_time_count: rft,
        right_first_time_percent: percent(rft),
        average_amend_rate: round_to(total_amends as f64 / total as f64, 2),
        beyond_threshold: options.beyond_threshold,
        beyond_threshold_count: beyond,
        beyond_threshold_percent: percent(beyond),
        uncategorized_count: uncategorized,
        categories,
        versions,
    })
}
