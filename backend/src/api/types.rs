//! REST API response types.
//!
//! Every response carries a `jobId` and a `generatedAt` timestamp so a
//! client can correlate it with the SSE log stream.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::error_chain;
use crate::models::Dataset;
use crate::parser::SourceInfo;
use crate::transform::pipeline::{ArtworkReport, StockRun};
use crate::transform::stats::StatsSummary;
use crate::transform::stock::{LocationCount, OrderTypeCount};

/// Response for `POST /api/artwork`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkResponse {
    pub job_id: String,
    pub status: String,
    pub generated_at: DateTime<Utc>,
    pub source: SourceInfo,
    pub summary: StatsSummary,
    /// Cleaned rows with the derived columns.
    pub cleaned: Dataset,
}

impl From<ArtworkReport> for ArtworkResponse {
    fn from(report: ArtworkReport) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: "ready".to_string(),
            generated_at: Utc::now(),
            cleaned: report.cleaned.to_dataset(),
            source: report.source,
            summary: report.summary,
        }
    }
}

/// Response for `POST /api/stock`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub job_id: String,
    pub status: String,
    pub generated_at: DateTime<Utc>,
    pub source: SourceInfo,
    pub order_types: Vec<OrderTypeCount>,
    pub top_locations: Vec<LocationCount>,
    pub classified: Dataset,
}

impl From<StockRun> for StockResponse {
    fn from(run: StockRun) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: "ready".to_string(),
            generated_at: Utc::now(),
            source: run.source,
            order_types: run.report.order_types,
            top_locations: run.report.top_locations,
            classified: run.report.classified,
        }
    }
}

/// Response for `POST /api/sheets`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsResponse {
    pub file_name: String,
    pub sheets: Vec<String>,
}

/// Create an error response body listing the error and its causes.
pub fn error_response(err: &(dyn std::error::Error + 'static)) -> Value {
    let mut chain = error_chain(err).into_iter();
    let error = chain.next().unwrap_or_default();
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "causes": chain.collect::<Vec<_>>(),
    })
}

/// Error body for failures that are not `std::error::Error` values.
pub fn message_response(message: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": message,
        "causes": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtworkConfig;
    use crate::error::{LoadError, PipelineError};
    use crate::transform::pipeline::run_artwork;

    #[test]
    fn test_error_response_lists_causes() {
        let err: PipelineError = LoadError::EmptyFile.into();
        let body = error_response(&err);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "could not load the upload");
        assert_eq!(body["causes"], json!(["uploaded file is empty"]));
    }

    #[test]
    fn test_message_response() {
        let body = message_response("No file provided");
        assert_eq!(body["error"], "No file provided");
        assert_eq!(body["causes"], json!([]));
    }

    #[test]
    fn test_artwork_response_shape() {
        let csv = b"POS Code,Client Versions,Category\nA,2,Members\nB,1,Mobile\n";
        let report = run_artwork(csv, "r.csv", &ArtworkConfig::default()).unwrap();
        let json = serde_json::to_value(ArtworkResponse::from(report)).unwrap();

        assert_eq!(json["status"], "ready");
        assert_eq!(json["source"]["format"], "csv");
        assert_eq!(json["summary"]["totalRecords"], 2);
        assert_eq!(json["summary"]["rightFirstTimePercent"], 50.0);
        assert_eq!(json["cleaned"]["columns"][3], "Amends");
        assert!(json["jobId"].as_str().is_some_and(|id| id.len() == 36));
    }
}
