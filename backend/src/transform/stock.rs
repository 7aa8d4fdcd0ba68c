//! Stock order engine: order-type classification, unique-order counts and
//! busiest locations.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::columns::{StockColumns, StockSchema};
use crate::error::TransformError;
use crate::models::{CellValue, Dataset, OrderType};

/// Name of the classification column appended to the stock dataset.
pub const ORDER_TYPE_COLUMN: &str = "Order Type";

/// Default number of locations reported.
pub const DEFAULT_TOP_LOCATIONS: usize = 10;

/// Unique orders per order type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTypeCount {
    pub order_type: OrderType,
    pub unique_orders: usize,
}

/// Order lines raised for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCount {
    pub location_code: String,
    pub location_name: String,
    pub order_lines: usize,
}

/// Output of [`transform_stock`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReport {
    /// Input rows with the order type appended.
    pub classified: Dataset,
    /// Both order types, store first.
    pub order_types: Vec<OrderTypeCount>,
    /// At most `top_n` locations, busiest first.
    pub top_locations: Vec<LocationCount>,
}

/// Classifies an `ordered_by` value: store orders mention `store_marker`
/// (compared case-insensitively).
pub fn classify(ordered_by: Option<&str>, store_marker: &str) -> OrderType {
    let marker = store_marker.to_lowercase();
    match ordered_by {
        Some(who) if who.to_lowercase().contains(&marker) => OrderType::Store,
        _ => OrderType::Helpdesk,
    }
}

/// Runs the stock pipeline over a raw dataset.
pub fn transform_stock(
    dataset: &Dataset,
    names: &StockColumns<'_>,
    store_marker: &str,
    top_n: usize,
) -> Result<StockReport, TransformError> {
    let schema = StockSchema::resolve(&dataset.columns, names)?;

    let order_types: Vec<OrderType> = dataset
        .rows
        .iter()
        .map(|row| classify(schema.ordered_by.cell(row).as_text().as_deref(), store_marker))
        .collect();

    // First occurrence of each order number decides its type.
    let mut seen: HashSet<Option<String>> = HashSet::new();
    let mut unique: HashMap<OrderType, usize> = HashMap::new();
    for (row, order_type) in dataset.rows.iter().zip(&order_types) {
        if seen.insert(schema.order_number.cell(row).as_text()) {
            *unique.entry(*order_type).or_default() += 1;
        }
    }
    let order_type_counts = OrderType::ALL
        .iter()
        .map(|t| OrderTypeCount {
            order_type: *t,
            unique_orders: unique.get(t).copied().unwrap_or(0),
        })
        .collect();

    let top_locations = top_locations(dataset, &schema, top_n);

    let classified = dataset.clone().with_column(
        ORDER_TYPE_COLUMN,
        order_types.iter().map(|t| CellValue::text(t.label())).collect(),
    );

    Ok(StockReport {
        classified,
        order_types: order_type_counts,
        top_locations,
    })
}

fn top_locations(dataset: &Dataset, schema: &StockSchema, top_n: usize) -> Vec<LocationCount> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<LocationCount> = Vec::new();

    for row in &dataset.rows {
        let code = schema.location_code.cell(row).as_text().unwrap_or_default();
        let name = schema.location_name.cell(row).as_text().unwrap_or_default();
        match index.get(&(code.clone(), name.clone())) {
            Some(&i) => groups[i].order_lines += 1,
            None => {
                index.insert((code.clone(), name.clone()), groups.len());
                groups.push(LocationCount {
                    location_code: code,
                    location_name: name,
                    order_lines: 1,
                });
            }
        }
    }

    // Stable sort keeps discovery order among equal counts.
    groups.sort_by(|a, b| b.order_lines.cmp(&a.order_lines));
    groups.truncate(top_n);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: StockColumns<'static> = StockColumns {
        ordered_by: "Ordered By",
        order_number: "Order Number",
        location_code: "Location Code",
        location_name: "Location Name",
    };

    fn dataset(rows: &[(&str, &str, &str, &str)]) -> Dataset {
        Dataset::new(
            vec![
                "Ordered By".into(),
                "Order Number".into(),
                "Location Code".into(),
                "Location Name".into(),
            ],
            rows.iter()
                .map(|(by, num, code, name)| vec![(*by).into(), (*num).into(), (*code).into(), (*name).into()])
                .collect(),
        )
    }

    const NAMES_LIST: [&str; 4] = ["Ordered By", "Order Number", "Location Code", "Location Name"];

    fn unique(report: &StockReport, t: OrderType) -> usize {
        report
            .order_types
            .iter()
            .find(|c| c.order_type == t)
            .map(|c| c.unique_orders)
            .unwrap()
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(Some("Store 12 - High St"), "store"), OrderType::Store);
        assert_eq!(classify(Some("BIG STORE"), "store"), OrderType::Store);
        assert_eq!(classify(Some("Helpdesk Team"), "store"), OrderType::Helpdesk);
        assert_eq!(classify(None, "store"), OrderType::Helpdesk);
    }

    #[test]
    fn test_unique_order_counts() {
        let ds = dataset(&[
            ("Store 12 - High St", "100", "S12", "High St"),
            ("Store 12 - High St", "100", "S12", "High St"),
            ("Store 4", "101", "S4", "Market Sq"),
            ("Helpdesk Team", "200", "S4", "Market Sq"),
            ("Helpdesk Team", "200", "S12", "High St"),
        ]);
        let report = transform_stock(&ds, &NAMES, "store", DEFAULT_TOP_LOCATIONS).unwrap();
        assert_eq!(unique(&report, OrderType::Store), 2);
        assert_eq!(unique(&report, OrderType::Helpdesk), 1);
        assert_eq!(report.order_types[0].order_type, OrderType::Store);
    }

    #[test]
    fn test_both_types_always_reported() {
        let ds = dataset(&[("Helpdesk", "1", "A", "Alpha")]);
        let report = transform_stock(&ds, &NAMES, "store", 10).unwrap();
        assert_eq!(report.order_types.len(), 2);
        assert_eq!(unique(&report, OrderType::Store), 0);
    }

    #[test]
    fn test_top_locations_counts_all_lines() {
        let ds = dataset(&[
            ("Store 1", "1", "B", "Beta"),
            ("Store 1", "1", "A", "Alpha"),
            ("Store 1", "2", "A", "Alpha"),
            ("Helpdesk", "3", "C", "Gamma"),
            ("Helpdesk", "3", "C", "Gamma"),
            ("Helpdesk", "4", "D", "Delta"),
        ]);
        let report = transform_stock(&ds, &NAMES, "store", 3).unwrap();
        let got: Vec<(&str, usize)> = report
            .top_locations
            .iter()
            .map(|l| (l.location_code.as_str(), l.order_lines))
            .collect();
        // A and C tie on 2; A was seen first. B beats D on discovery order.
        assert_eq!(got, vec![("A", 2), ("C", 2), ("B", 1)]);
    }

    #[test]
    fn test_location_groups_by_code_and_name() {
        let ds = dataset(&[
            ("Store", "1", "A", "Alpha"),
            ("Store", "2", "A", "Alpha (old)"),
        ]);
        let report = transform_stock(&ds, &NAMES, "store", 10).unwrap();
        assert_eq!(report.top_locations.len(), 2);
    }

    #[test]
    fn test_classified_dataset_has_order_type() {
        let ds = dataset(&[("Store 9", "1", "A", "Alpha"), ("Ops", "2", "A", "Alpha")]);
        let report = transform_stock(&ds, &NAMES, "store", 10).unwrap();
        let idx = report.classified.column_index(ORDER_TYPE_COLUMN).unwrap();
        assert_eq!(report.classified.rows[0][idx], CellValue::Text("Store Order".into()));
        assert_eq!(report.classified.rows[1][idx], CellValue::Text("Helpdesk Order".into()));
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let ds = Dataset {
            columns: NAMES_LIST.iter().map(|c| c.to_string()).collect(),
            rows: vec![vec!["Store 2".into(), "7".into()], vec![]],
            source_rows: vec![],
        };
        let report = transform_stock(&ds, &NAMES, "store", 10).unwrap();
        assert_eq!(unique(&report, OrderType::Store), 1);
        assert_eq!(unique(&report, OrderType::Helpdesk), 1);
        assert_eq!(report.top_locations[0].location_code, "");
        assert_eq!(report.top_locations[0].order_lines, 2);
        assert_eq!(report.classified.rows[1].len(), 5);
    }

    #[test]
    fn test_missing_column() {
        let ds = Dataset::new(vec!["ordered by".into()], vec![]);
        let err = transform_stock(&ds, &NAMES, "store", 10).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn { ref column, .. } if column == "Order Number"));
    }
}
