use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{Stream, StreamExt};
use marketlens_agent::{ReportRecord, ReportSummary};
use marketlens_tools::{normalize_ticker, Period, StockEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const MAX_REPORT_LIMIT: usize = 50;
const DEFAULT_REPORT_LIMIT: usize = 10;

/// Canonical form of a ticker taken from a URL, or a 400.
fn path_ticker(raw: &str) -> Result<String, ApiError> {
    normalize_ticker(raw).map_err(|e| {
        warn!(ticker = %raw, error = %e, "Rejected ticker");
        ApiError::bad_request("INVALID_TICKER", format!("Invalid ticker '{raw}'"))
    })
}

/// `POST /api/v1/analyze/{ticker}`: streams the run as server-sent events.
///
/// Each step becomes one event named after its type with the step JSON as data.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let ticker = path_ticker(&ticker)?;

    if let Err(e) = state
        .analytics
        .load_stock_data(&ticker, Period::SixMonths)
        .await
    {
        warn!(ticker = %ticker, error = %e, "Analysis requested for unknown ticker");
        return Err(ApiError::not_found(
            "TICKER_NOT_FOUND",
            format!("Ticker '{ticker}' not found"),
        ));
    }

    info!(ticker = %ticker, "Analysis started");
    let steps = state.runner.run(&ticker, state.limits);
    let events = steps.map(|step| Event::default().event(step.type_name()).json_data(&step));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub ticker: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportList {
    pub reports: Vec<ReportSummary>,
    pub total: usize,
}

/// `GET /api/v1/reports?limit=N&ticker=T`
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ReportList>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_REPORT_LIMIT)
        .min(MAX_REPORT_LIMIT);
    let reports = state
        .store
        .list_reports(limit, query.ticker.as_deref())
        .await?;
    Ok(Json(ReportList {
        total: reports.len(),
        reports,
    }))
}

async fn find_report(state: &AppState, id: &str) -> Result<ReportRecord, ApiError> {
    state
        .store
        .get_report(id)
        .await?
        .ok_or_else(|| ApiError::not_found("REPORT_NOT_FOUND", format!("Report '{id}' not found")))
}

/// `GET /api/v1/reports/{id}`
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReportRecord>, ApiError> {
    find_report(&state, &id).await.map(Json)
}

/// `GET /api/v1/reports/{id}/pdf`: the rendered document, when one was produced.
pub async fn get_report_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = find_report(&state, &id).await?;
    let path = record.document_path.ok_or_else(|| {
        ApiError::not_found("REPORT_NOT_FOUND", format!("Report '{id}' has no document"))
    })?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        warn!(run_id = %id, path = %path.display(), error = %e, "Report document missing");
        ApiError::not_found("REPORT_NOT_FOUND", format!("Document of report '{id}' is missing"))
    })?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StockList {
    pub stocks: Vec<StockEntry>,
}

/// `GET /api/v1/stocks`: every stock with data, with its latest price.
pub async fn list_stocks(State(state): State<Arc<AppState>>) -> Result<Json<StockList>, ApiError> {
    let stocks = state.catalogue.listing(state.analytics.as_ref()).await?;
    Ok(Json(StockList { stocks }))
}

/// `GET /api/v1/stocks/{ticker}/summary`: six-month price summary with company details.
pub async fn stock_summary(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ticker = path_ticker(&ticker)?;
    let mut summary = state
        .analytics
        .load_stock_data(&ticker, Period::SixMonths)
        .await
        .map_err(|_| ApiError::not_found("TICKER_NOT_FOUND", format!("Ticker '{ticker}' not found")))?;

    let info = state.catalogue.info(&ticker);
    if let Some(obj) = summary.as_object_mut() {
        obj.insert("name".into(), info.name.into());
        obj.insert("sector".into(), info.sector.into());
    }
    Ok(Json(summary))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub llm_provider: String,
    pub llm_fallback: Option<String>,
    pub tools: usize,
    pub version: String,
}

/// `GET /api/v1/health` and `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    let gateway = state.runner.gateway();
    Json(Health {
        status: "ok".into(),
        llm_provider: gateway.primary_name().to_string(),
        llm_fallback: gateway.fallback_name().map(str::to_string),
        tools: state.runner.tools().tool_count(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
