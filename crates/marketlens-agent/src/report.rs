use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketlens_core::{
    AnalysisResult, ChartConfig, Confidence, MarketlensResult, Signal, Step,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Rendered chart attached to a report. Empty when rendering failed or is disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartArtifact {
    #[serde(default)]
    pub image_base64: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ChartArtifact {
    pub fn is_empty(&self) -> bool {
        self.image_base64.is_empty() && self.path.is_none()
    }
}

/// Turns a chart configuration (with its price series) into an image.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render_chart(&self, config: &ChartConfig) -> MarketlensResult<ChartArtifact>;
}

/// Produces the downloadable document of a finished analysis.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Returns the path of the written document, if one was produced.
    async fn render_document(
        &self,
        analysis: &AnalysisResult,
        chart: &ChartArtifact,
        steps: &[Step],
    ) -> MarketlensResult<Option<PathBuf>>;
}

/// Renderer that produces nothing; the report ships without chart image or document.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

#[async_trait]
impl ChartRenderer for NullRenderer {
    async fn render_chart(&self, _config: &ChartConfig) -> MarketlensResult<ChartArtifact> {
        Ok(ChartArtifact::default())
    }
}

#[async_trait]
impl DocumentRenderer for NullRenderer {
    async fn render_document(
        &self,
        _analysis: &AnalysisResult,
        _chart: &ChartArtifact,
        _steps: &[Step],
    ) -> MarketlensResult<Option<PathBuf>> {
        Ok(None)
    }
}

/// Listing entry of a stored report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub ticker: String,
    pub signal: Signal,
    pub confidence: Confidence,
    pub thesis: String,
    pub generated_at: DateTime<Utc>,
}

/// A finished analysis together with the trace that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    pub ticker: String,
    pub generated_at: DateTime<Utc>,
    pub analysis: AnalysisResult,
    pub reasoning_trace: Vec<Step>,
    pub tool_calls_count: u32,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub chart: ChartArtifact,
    #[serde(default)]
    pub document_path: Option<PathBuf>,
}

impl ReportRecord {
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            id: self.id.clone(),
            ticker: self.ticker.clone(),
            signal: self.analysis.signal,
            confidence: self.analysis.confidence,
            thesis: self.analysis.thesis.clone(),
            generated_at: self.generated_at,
        }
    }
}

/// Durable storage for finished reports and their step history.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_report(&self, record: &ReportRecord) -> MarketlensResult<()>;

    /// Stores one step of a run's history at position `seq` (0-based).
    async fn save_step(&self, run_id: &str, step: &Step, seq: usize) -> MarketlensResult<()>;

    async fn get_report(&self, id: &str) -> MarketlensResult<Option<ReportRecord>>;

    /// Newest first, optionally restricted to one ticker.
    async fn list_reports(
        &self,
        limit: usize,
        ticker: Option<&str>,
    ) -> MarketlensResult<Vec<ReportSummary>>;
}
