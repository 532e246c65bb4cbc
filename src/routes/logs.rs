//! Treatment log browsing: stored records, CSV export, summaries, the latest
//! text report, and analysis of CSV files uploaded by the operator.

use axum::{
    extract::Query,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{error_response, AppState};
use crate::history::{self, HistoryRow, Parameter, ParameterSummary, TrendPoint};
use crate::store;

// ---

const DEFAULT_LIMIT: u32 = 1000;

/// Upper bound for exports and summaries over the stored log.
const MAX_ROWS: u32 = 100_000;

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/logs", get(list_logs))
        .route("/logs/export", get(export_logs))
        .route("/logs/summary", get(summarize_logs))
        .route("/logs/report", get(latest_report))
        .route("/logs/analyze", post(analyze_upload))
}

/// Query parameters for filtering the log
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Inclusive start date, e.g. `2025-03-01`
    from: Option<NaiveDate>,
    /// Inclusive end date
    to: Option<NaiveDate>,
    limit: Option<u32>,
    /// Parameter for the trend series (default `BOD`)
    parameter: Option<Parameter>,
    /// `csv` returns the filtered upload itself instead of the analysis
    #[serde(default)]
    format: ResponseFormat,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ResponseFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    // ---
    total_records: usize,
    filtered_records: usize,
    summary: Vec<ParameterSummary>,
    parameter: Parameter,
    trend: Vec<TrendPoint>,
}

fn analyze(rows: Vec<HistoryRow>, params: &LogsQuery) -> AnalysisResponse {
    // ---
    let total_records = rows.len();
    let filtered = history::filter_by_date(rows, params.from, params.to);
    let parameter = params.parameter.unwrap_or(Parameter::Bod);

    AnalysisResponse {
        total_records,
        filtered_records: filtered.len(),
        summary: history::summarize(&filtered),
        parameter,
        trend: history::trend(&filtered, parameter),
    }
}

/// Handle `GET /logs`.
async fn list_logs(
    Query(params): Query<LogsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    info!("GET /logs - {:?}", params);
    if let Err(e) = history::check_range(params.from, params.to) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    match store::fetch_records(&state.pool, params.from, params.to, limit).await {
        Ok(records) => {
            debug!("GET /logs - Returning {} records", records.len());
            (StatusCode::OK, Json(records)).into_response()
        }
        Err(e) => {
            error!("Failed to read treatment log: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read treatment log")
        }
    }
}

/// Handle `GET /logs/export`: the filtered log as a CSV download.
async fn export_logs(
    Query(params): Query<LogsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    info!("GET /logs/export - {:?}", params);
    if let Err(e) = history::check_range(params.from, params.to) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let limit = params.limit.unwrap_or(MAX_ROWS);
    let records = match store::fetch_records(&state.pool, params.from, params.to, limit).await {
        Ok(records) => records,
        Err(e) => {
            error!("Failed to read treatment log: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read treatment log",
            );
        }
    };

    match history::to_csv(&records) {
        Ok(csv) => csv_attachment(csv),
        Err(e) => {
            error!("Failed to build CSV export: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to build CSV export")
        }
    }
}

fn csv_attachment(csv: String) -> Response {
    // ---
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"filtered_logs.csv\"",
            ),
        ],
        csv,
    )
        .into_response()
}

/// Handle `GET /logs/summary`: statistics and trend over the stored log.
async fn summarize_logs(
    Query(params): Query<LogsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    info!("GET /logs/summary - {:?}", params);
    if let Err(e) = history::check_range(params.from, params.to) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    match store::fetch_records(&state.pool, params.from, params.to, MAX_ROWS).await {
        Ok(records) => {
            let rows = records.iter().map(HistoryRow::from).collect();
            (StatusCode::OK, Json(analyze(rows, &params))).into_response()
        }
        Err(e) => {
            error!("Failed to read treatment log: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read treatment log")
        }
    }
}

/// Handle `GET /logs/report`: the latest record as a `key: value` text report.
async fn latest_report(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    match store::latest_record(&state.pool).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            record.to_report(),
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Treatment log is empty"),
        Err(e) => {
            error!("Failed to read latest record: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read treatment log")
        }
    }
}

/// Handle `POST /logs/analyze`: the request body is a CSV log from any plant.
///
/// With `format=csv` the date-filtered rows come back as a download, every
/// uploaded column kept.
async fn analyze_upload(Query(params): Query<LogsQuery>, body: String) -> impl IntoResponse {
    // ---
    info!("POST /logs/analyze - {} bytes, {:?}", body.len(), params);
    if let Err(e) = history::check_range(params.from, params.to) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    if params.format == ResponseFormat::Csv {
        return match history::filter_upload(&body, params.from, params.to) {
            Ok(csv) => csv_attachment(csv),
            Err(e) => {
                debug!("POST /logs/analyze - Rejected upload: {:#}", e);
                error_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("Error processing CSV: {:#}", e),
                )
            }
        };
    }

    let rows = match history::parse_csv(&body) {
        Ok(rows) => rows,
        Err(e) => {
            debug!("POST /logs/analyze - Rejected upload: {:#}", e);
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Error processing CSV: {:#}", e),
            );
        }
    };

    let response = analyze(rows, &params);
    info!(
        "POST /logs/analyze - {} of {} records in range",
        response.filtered_records, response.total_records
    );
    (StatusCode::OK, Json(response)).into_response()
}
