use crate::api;
use axum::routing::{get, post};
use axum::Router;
use marketlens_agent::{AgentRunner, ReportStore, RunLimits};
use marketlens_tools::{MarketAnalytics, StockCatalogue};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub runner: AgentRunner,
    pub store: Arc<dyn ReportStore>,
    pub analytics: Arc<dyn MarketAnalytics>,
    /// Names and sectors shown alongside prices.
    pub catalogue: StockCatalogue,
    /// Budget applied to every run started over HTTP.
    pub limits: RunLimits,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    pub fn build(state: AppState) -> Router {
        Router::new()
            .route("/api/v1/analyze/{ticker}", post(api::analyze))
            .route("/api/v1/reports", get(api::list_reports))
            .route("/api/v1/reports/{id}", get(api::get_report))
            .route("/api/v1/reports/{id}/pdf", get(api::get_report_document))
            .route("/api/v1/stocks", get(api::list_stocks))
            .route("/api/v1/stocks/{ticker}/summary", get(api::stock_summary))
            .route("/api/v1/health", get(api::health))
            .route("/health", get(api::health))
            .with_state(Arc::new(state))
    }
}
