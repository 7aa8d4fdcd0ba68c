//! HTTP server for the Kpiload API.
//!
//! # API Endpoints
//!
//! | Method | Path                     | Description                          |
//! |--------|--------------------------|--------------------------------------|
//! | GET    | `/health`                | Health check                         |
//! | POST   | `/api/artwork`           | Artwork KPIs as JSON                 |
//! | POST   | `/api/artwork/workbook`  | Artwork KPIs as an `.xlsx` download  |
//! | POST   | `/api/stock`             | Stock order analysis as JSON         |
//! | POST   | `/api/stock/workbook`    | Stock order analysis as `.xlsx`      |
//! | POST   | `/api/sheets`            | Sheet names of an uploaded workbook  |
//! | GET    | `/api/logs`              | SSE stream for real-time logs        |
//!
//! Uploads are `multipart/form-data` with a `file` field and optional
//! `sheet`, `headerRow`, `threshold`, `precision` and `top` overrides.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, message_response, ArtworkResponse, SheetsResponse, StockResponse};
use crate::config::{AppConfig, ArtworkConfig, StockConfig};
use crate::error::{PipelineError, ServerError};
use crate::export::{artwork_sheets, stock_sheets, write_workbook};
use crate::parser::list_sheets;
use crate::transform::pipeline::{run_artwork, run_stock};
use crate::transform::stats::RoundingPrecision;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

type ApiError = (StatusCode, Json<Value>);
type SharedConfig = Arc<AppConfig>;

/// Builds the router. Split out of [`start_server`] so it can be mounted elsewhere.
pub fn router(config: AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/artwork", post(artwork_json))
        .route("/api/artwork/workbook", post(artwork_workbook))
        .route("/api/stock", post(stock_json))
        .route("/api/stock/workbook", post(stock_workbook))
        .route("/api/sheets", post(sheets))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(Arc::new(config))
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: AppConfig) -> Result<(), ServerError> {
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Kpiload server running on http://localhost:{}", port);
    println!("   POST /api/artwork[/workbook] - Artwork KPIs");
    println!("   POST /api/stock[/workbook]   - Stock order analysis");
    println!("   POST /api/sheets             - List workbook sheets");
    println!("   GET  /api/logs               - SSE log stream");
    println!("   GET  /health                 - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "kpiload",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "artwork": "POST /api/artwork",
            "artworkWorkbook": "POST /api/artwork/workbook",
            "stock": "POST /api/stock",
            "stockWorkbook": "POST /api/stock/workbook",
            "sheets": "POST /api/sheets",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers just skip the missed entries.
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Upload form
// =============================================================================

/// A parsed multipart upload.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    sheet: Option<String>,
    header_row: Option<usize>,
    threshold: Option<i64>,
    precision: Option<RoundingPrecision>,
    top: Option<usize>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(&format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                form.file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("Read error: {}", e)))?;
                form.file = Some(bytes.to_vec());
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(&format!("Read error: {}", e)))?;
                form.set_field(&name, &text).map_err(|e| api_error(StatusCode::BAD_REQUEST, &e))?;
            }
        }

        Ok(form)
    }

    /// Records one text field. Unknown fields are ignored, blank values mean "not set".
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), ServerError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        let invalid = |what: &str| ServerError::BadRequest(format!("'{}' must be {}, got '{}'", name, what, value));
        match name {
            "sheet" => self.sheet = Some(value.to_string()),
            "headerRow" => self.header_row = Some(value.parse().map_err(|_| invalid("a row number"))?),
            "threshold" => self.threshold = Some(value.parse().map_err(|_| invalid("a whole number"))?),
            "precision" => self.precision = Some(value.parse().map_err(|_| invalid("1 or 2"))?),
            "top" => self.top = Some(value.parse().map_err(|_| invalid("a positive number"))?),
            _ => {}
        }
        Ok(())
    }

    /// Takes the file, or fails when none was sent.
    fn take_file(&mut self) -> Result<(Vec<u8>, String), ApiError> {
        let bytes = self.file.take().ok_or_else(|| bad_request("No file provided"))?;
        let name = self.file_name.take().unwrap_or_else(|| "upload".to_string());
        log_info(format!("📄 New upload: {} ({} bytes)", name, bytes.len()));
        Ok((bytes, name))
    }

    fn artwork_config(&self, base: &ArtworkConfig) -> ArtworkConfig {
        let mut config = base.clone();
        if let Some(sheet) = &self.sheet {
            config.sheet_name = Some(sheet.clone());
        }
        if let Some(row) = self.header_row {
            config.header_row = row;
        }
        if let Some(threshold) = self.threshold {
            config.beyond_threshold = threshold;
        }
        if let Some(precision) = self.precision {
            config.rounding_precision = precision;
        }
        config
    }

    fn stock_config(&self, base: &StockConfig) -> StockConfig {
        let mut config = base.clone();
        if let Some(sheet) = &self.sheet {
            config.sheet_name = Some(sheet.clone());
        }
        if let Some(row) = self.header_row {
            config.header_row = row;
        }
        if let Some(top) = self.top {
            config.top_locations = top;
        }
        config
    }
}

// =============================================================================
// Error mapping
// =============================================================================

fn api_error(status: StatusCode, err: &(dyn std::error::Error + 'static)) -> ApiError {
    log_error(err.to_string());
    (status, Json(error_response(err)))
}

fn bad_request(message: &str) -> ApiError {
    log_error(message);
    (StatusCode::BAD_REQUEST, Json(message_response(message)))
}

/// Spreadsheet problems the user can fix are 422; unreadable uploads are 400.
fn pipeline_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_data_problem() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn pipeline_error(err: PipelineError) -> ApiError {
    let status = pipeline_status(&err);
    let err = ServerError::from(err);
    api_error(status, &err)
}

/// Runs CPU-bound pipeline work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(pipeline_error),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, &e)),
    }
}

fn xlsx_download(bytes: Vec<u8>, upload_name: &str, suffix: &str) -> Response {
    let stem = upload_name
        .rsplit_once('.')
        .map_or(upload_name, |(stem, _)| stem)
        .replace(['"', '\\', '/'], "_");
    let disposition = format!("attachment; filename=\"{}-{}.xlsx\"", stem, suffix);
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

async fn artwork_json(
    State(config): State<SharedConfig>,
    multipart: Multipart,
) -> Result<Json<ArtworkResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let (bytes, name) = form.take_file()?;
    let artwork = form.artwork_config(&config.artwork);

    let report = blocking(move || run_artwork(&bytes, &name, &artwork)).await?;
    Ok(Json(ArtworkResponse::from(report)))
}

async fn artwork_workbook(State(config): State<SharedConfig>, multipart: Multipart) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let (bytes, name) = form.take_file()?;
    let artwork = form.artwork_config(&config.artwork);

    let upload_name = name.clone();
    let xlsx = blocking(move || {
        let report = run_artwork(&bytes, &name, &artwork)?;
        Ok(write_workbook(&artwork_sheets(&report))?)
    })
    .await?;
    Ok(xlsx_download(xlsx, &upload_name, "kpis"))
}

async fn stock_json(
    State(config): State<SharedConfig>,
    multipart: Multipart,
) -> Result<Json<StockResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let (bytes, name) = form.take_file()?;
    let stock = form.stock_config(&config.stock);

    let run = blocking(move || run_stock(&bytes, &name, &stock)).await?;
    Ok(Json(StockResponse::from(run)))
}

async fn stock_workbook(State(config): State<SharedConfig>, multipart: Multipart) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let (bytes, name) = form.take_file()?;
    let stock = form.stock_config(&config.stock);

    let upload_name = name.clone();
    let xlsx = blocking(move || {
        let run = run_stock(&bytes, &name, &stock)?;
        Ok(write_workbook(&stock_sheets(&run.report))?)
    })
    .await?;
    Ok(xlsx_download(xlsx, &upload_name, "stock"))
}

async fn sheets(multipart: Multipart) -> Result<Json<SheetsResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let (bytes, file_name) = form.take_file()?;

    let sheets = list_sheets(&bytes).map_err(|e| pipeline_error(e.into()))?;
    Ok(Json(SheetsResponse { file_name, sheets }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoadError, StatsError, TransformError};

    #[test]
    fn test_form_fields() {
        let mut form = UploadForm::default();
        form.set_field("sheet", "general_report").unwrap();
        form.set_field("headerRow", " 2 ").unwrap();
        form.set_field("threshold", "5").unwrap();
        form.set_field("precision", "1").unwrap();
        form.set_field("top", "").unwrap();
        form.set_field("unrelated", "whatever").unwrap();

        let artwork = form.artwork_config(&ArtworkConfig::default());
        assert_eq!(artwork.sheet_name.as_deref(), Some("general_report"));
        assert_eq!(artwork.header_row, 2);
        assert_eq!(artwork.beyond_threshold, 5);
        assert_eq!(artwork.rounding_precision, RoundingPrecision::One);

        let stock = form.stock_config(&StockConfig::default());
        assert_eq!(stock.top_locations, 10);
        assert_eq!(stock.header_row, 2);
    }

    #[test]
    fn test_bad_form_value() {
        let mut form = UploadForm::default();
        let err = form.set_field("precision", "3").unwrap_err();
        assert!(err.to_string().contains("'precision' must be 1 or 2"));
        assert!(form.set_field("headerRow", "-1").is_err());
    }

    #[test]
    fn test_status_mapping() {
        let missing = PipelineError::Transform(TransformError::MissingColumn {
            column: "POS Code".into(),
            available: vec![],
        });
        assert_eq!(pipeline_status(&missing), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            pipeline_status(&PipelineError::Stats(StatsError::EmptyDataset)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            pipeline_status(&PipelineError::Load(LoadError::EmptyFile)),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_download_headers() {
        let response = xlsx_download(vec![1, 2, 3], "general \"report\".xlsx", "kpis");
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert_eq!(disposition, "attachment; filename=\"general _report_-kpis.xlsx\"");
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);
    }
}
