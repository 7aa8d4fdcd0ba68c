//! Artwork cleaning engine.
//!
//! Turns a raw artwork-version export into one row per POS code:
//!
//! ```text
//! sort by versions desc (stable) → dedupe POS code (keep first)
//!   → drop zero-version rows → derive Amends / Right First Time
//!   → apply category rules in order
//! ```
//!
//! Category rules are an ordered list evaluated one after another against the
//! record's *current* category, so a later rule sees what earlier rules wrote.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::columns::{ArtworkColumns, ArtworkSchema};
use crate::error::{TransformError, TransformResult};
use crate::models::{ArtworkRecord, ArtworkTable, CellValue, Dataset};

// =============================================================================
// Category rules
// =============================================================================

/// Condition half of a [`CategoryRule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Project description contains `pattern` (case-sensitive).
    /// A blank description never matches.
    DescriptionContains { pattern: String },

    /// Current category is exactly one of `categories`.
    CategoryIn { categories: Vec<String> },
}

impl RuleCondition {
    fn matches(&self, record: &ArtworkRecord) -> bool {
        match self {
            RuleCondition::DescriptionContains { pattern } => record
                .project_description
                .as_deref()
                .is_some_and(|d| d.contains(pattern.as_str())),
            RuleCondition::CategoryIn { categories } => record
                .category
                .as_deref()
                .is_some_and(|c| categories.iter().any(|k| k == c)),
        }
    }
}

/// Rewrites a record's category to `set` when `when` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub when: RuleCondition,
    pub set: String,
}

impl CategoryRule {
    pub fn description_contains(pattern: &str, set: &str) -> Self {
        Self {
            when: RuleCondition::DescriptionContains {
                pattern: pattern.to_string(),
            },
            set: set.to_string(),
        }
    }

    pub fn category_in(categories: &[&str], set: &str) -> Self {
        Self {
            when: RuleCondition::CategoryIn {
                categories: categories.iter().map(|c| c.to_string()).collect(),
            },
            set: set.to_string(),
        }
    }
}

/// The production rule set, in precedence order.
pub fn default_category_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::description_contains("ROI", "ROI"),
        CategoryRule::category_in(&["Members", "Starbuys"], "Main Event"),
        CategoryRule::category_in(&["Loyalty / CRM", "Mobile"], "Other"),
    ]
}

/// Applies `rules` to one record, left to right.
pub fn apply_category_rules(record: &mut ArtworkRecord, rules: &[CategoryRule]) {
    for rule in rules {
        if rule.when.matches(record) {
            record.category = Some(rule.set.clone());
        }
    }
}

/// Human-readable listing of a rule set.
pub fn rules_description(rules: &[CategoryRule]) -> String {
    let mut out = String::from("Category rules (applied top to bottom):\n");
    for (i, rule) in rules.iter().enumerate() {
        let condition = match &rule.when {
            RuleCondition::DescriptionContains { pattern } => {
                format!("project description contains \"{}\"", pattern)
            }
            RuleCondition::CategoryIn { categories } => {
                let quoted: Vec<String> = categories.iter().map(|c| format!("\"{}\"", c)).collect();
                format!("category is one of {}", quoted.join(", "))
            }
        };
        out.push_str(&format!("  {}. if {} → \"{}\"\n", i + 1, condition, rule.set));
    }
    out
}

// =============================================================================
// Engine
// =============================================================================

/// Cleans a raw artwork dataset.
///
/// `header_row` is the zero-based sheet row holding the headers; it is only
/// used to report spreadsheet row numbers in conversion errors.
pub fn transform_artwork(
    dataset: &Dataset,
    names: &ArtworkColumns<'_>,
    rules: &[CategoryRule],
    header_row: usize,
) -> TransformResult<ArtworkTable> {
    let schema = ArtworkSchema::resolve(&dataset.columns, names)?;

    let width = dataset.columns.len();
    let mut records = dataset
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            // Fall back to contiguous rows below the header when provenance is unknown.
            let sheet_row = dataset.sheet_row_number(idx).unwrap_or(header_row + idx + 2);
            read_record(&schema, idx, row, width, sheet_row)
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Stable: equal version counts keep their upload order.
    records.sort_by(|a, b| b.client_versions.cmp(&a.client_versions));

    let mut seen: HashSet<Option<String>> = HashSet::new();
    records.retain(|r| seen.insert(r.pos_code.clone()));

    records.retain(|r| r.client_versions != 0);

    for record in &mut records {
        record.amends = record.client_versions - 1;
        record.right_first_time = record.client_versions == 1;
        apply_category_rules(record, rules);
    }

    Ok(ArtworkTable {
        columns: dataset.columns.clone(),
        schema,
        records,
    })
}

fn read_record(
    schema: &ArtworkSchema,
    idx: usize,
    row: &[CellValue],
    width: usize,
    sheet_row: usize,
) -> Result<ArtworkRecord, TransformError> {
    let versions_cell = schema.client_versions.cell(row);
    let client_versions = versions_cell
        .as_whole_number()
        .filter(|v| *v >= 0)
        .ok_or_else(|| TransformError::TypeConversion {
            column: schema.client_versions.name.clone(),
            row: sheet_row,
            value: versions_cell.as_text().unwrap_or_default(),
        })?;

    let mut cells = row.to_vec();
    cells.resize(width, CellValue::Empty);

    Ok(ArtworkRecord {
        source_row: idx,
        pos_code: schema.pos_code.cell(row).as_text(),
        client_versions,
        project_description: schema
            .project_description
            .as_ref()
            .and_then(|c| c.cell(row).as_text()),
        category: schema.category.cell(row).as_text(),
        amends: 0,
        right_first_time: false,
        cells,
    })
}
