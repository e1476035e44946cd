use crate::analytics::{
    normalize_ticker, ChartRequest, LevelMethod, MarketAnalytics, PatternScope, Period,
};
use crate::registry::ToolRegistry;
use crate::tool::{Tool, ToolDescriptor};
use async_trait::async_trait;
use marketlens_core::{MarketlensError, MarketlensResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// The fixed set of market-analysis tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketTool {
    LoadStockData,
    CalculateIndicator,
    DetectPatterns,
    FindSupportResistance,
    CompareWithIndex,
    CompareWithSector,
    AnalyzeVolume,
    GenerateChart,
}

impl MarketTool {
    /// All tools, in the order they are offered to the model.
    pub const ALL: [MarketTool; 8] = [
        MarketTool::LoadStockData,
        MarketTool::CalculateIndicator,
        MarketTool::DetectPatterns,
        MarketTool::FindSupportResistance,
        MarketTool::CompareWithIndex,
        MarketTool::CompareWithSector,
        MarketTool::AnalyzeVolume,
        MarketTool::GenerateChart,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketTool::LoadStockData => "load_stock_data",
            MarketTool::CalculateIndicator => "calculate_indicator",
            MarketTool::DetectPatterns => "detect_patterns",
            MarketTool::FindSupportResistance => "find_support_resistance",
            MarketTool::CompareWithIndex => "compare_with_index",
            MarketTool::CompareWithSector => "compare_with_sector",
            MarketTool::AnalyzeVolume => "analyze_volume",
            MarketTool::GenerateChart => "generate_chart",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            MarketTool::LoadStockData => "Load stock OHLCV data and compute summary stats.",
            MarketTool::CalculateIndicator => {
                "Calculate a technical indicator (e.g. RSI, MACD, SMA, EMA, BBANDS)."
            }
            MarketTool::DetectPatterns => "Detect candlestick and chart patterns.",
            MarketTool::FindSupportResistance => "Find key support and resistance levels.",
            MarketTool::CompareWithIndex => "Compare a stock with KSE-100 index performance.",
            MarketTool::CompareWithSector => "Compare stock performance with sector peers.",
            MarketTool::AnalyzeVolume => "Analyze volume trends and unusual activity.",
            MarketTool::GenerateChart => {
                "Generate a candlestick chart with overlays and annotations."
            }
        }
    }

    fn input_schema(&self) -> serde_json::Value {
        let ticker = json!({"type": "string", "description": "PSX ticker symbol, e.g. OGDC"});
        let period = json!({"type": "string", "enum": ["1M", "3M", "6M", "1Y"]});
        match self {
            MarketTool::LoadStockData
            | MarketTool::CompareWithIndex
            | MarketTool::AnalyzeVolume => json!({
                "type": "object",
                "properties": { "ticker": ticker, "period": period },
                "required": ["ticker"]
            }),
            MarketTool::CalculateIndicator => json!({
                "type": "object",
                "properties": {
                    "ticker": ticker,
                    "indicator": {"type": "string"},
                    "params": {"type": "object"}
                },
                "required": ["ticker", "indicator"]
            }),
            MarketTool::DetectPatterns => json!({
                "type": "object",
                "properties": {
                    "ticker": ticker,
                    "pattern_type": {"type": "string", "enum": ["candlestick", "chart", "both"]}
                },
                "required": ["ticker"]
            }),
            MarketTool::FindSupportResistance => json!({
                "type": "object",
                "properties": {
                    "ticker": ticker,
                    "method": {"type": "string", "enum": ["pivot", "fibonacci", "both"]}
                },
                "required": ["ticker"]
            }),
            MarketTool::CompareWithSector => json!({
                "type": "object",
                "properties": { "ticker": ticker },
                "required": ["ticker"]
            }),
            MarketTool::GenerateChart => json!({
                "type": "object",
                "properties": {
                    "ticker": ticker,
                    "period": period,
                    "overlays": {"type": "array", "items": {"type": "string"}},
                    "annotations": {"type": "array", "items": {"type": "string"}},
                    "style": {"type": "string", "enum": ["dark", "light"]}
                },
                "required": ["ticker"]
            }),
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

// -- Argument shapes --

#[derive(Deserialize)]
struct TickerArgs {
    ticker: String,
}

#[derive(Deserialize)]
struct TickerPeriodArgs {
    ticker: String,
    #[serde(default)]
    period: Period,
}

#[derive(Deserialize)]
struct IndicatorArgs {
    ticker: String,
    indicator: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct PatternArgs {
    ticker: String,
    #[serde(default)]
    pattern_type: PatternScope,
}

#[derive(Deserialize)]
struct LevelArgs {
    ticker: String,
    #[serde(default)]
    method: LevelMethod,
}

#[derive(Deserialize)]
struct ChartArgs {
    ticker: String,
    #[serde(flatten)]
    request: ChartRequest,
}

/// A [`MarketTool`] bound to the data source that answers it.
pub struct MarketToolHandler {
    tool: MarketTool,
    descriptor: ToolDescriptor,
    analytics: Arc<dyn MarketAnalytics>,
}

impl MarketToolHandler {
    pub fn new(tool: MarketTool, analytics: Arc<dyn MarketAnalytics>) -> Self {
        Self {
            tool,
            descriptor: tool.descriptor(),
            analytics,
        }
    }

    fn parse<T: DeserializeOwned>(&self, args: serde_json::Value) -> MarketlensResult<T> {
        serde_json::from_value(args).map_err(|e| {
            MarketlensError::Tool(format!("invalid arguments for {}: {e}", self.tool.name()))
        })
    }
}

#[async_trait]
impl Tool for MarketToolHandler {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: serde_json::Value) -> MarketlensResult<serde_json::Value> {
        debug!(tool = self.tool.name(), args = %args, "Invoking market tool");
        let data = &self.analytics;
        match self.tool {
            MarketTool::LoadStockData => {
                let a: TickerPeriodArgs = self.parse(args)?;
                data.load_stock_data(&normalize_ticker(&a.ticker)?, a.period).await
            }
            MarketTool::CalculateIndicator => {
                let a: IndicatorArgs = self.parse(args)?;
                let ticker = normalize_ticker(&a.ticker)?;
                data.calculate_indicator(&ticker, &a.indicator, &a.params).await
            }
            MarketTool::DetectPatterns => {
                let a: PatternArgs = self.parse(args)?;
                data.detect_patterns(&normalize_ticker(&a.ticker)?, a.pattern_type).await
            }
            MarketTool::FindSupportResistance => {
                let a: LevelArgs = self.parse(args)?;
                data.find_support_resistance(&normalize_ticker(&a.ticker)?, a.method).await
            }
            MarketTool::CompareWithIndex => {
                let a: TickerPeriodArgs = self.parse(args)?;
                data.compare_with_index(&normalize_ticker(&a.ticker)?, a.period).await
            }
            MarketTool::CompareWithSector => {
                let a: TickerArgs = self.parse(args)?;
                data.compare_with_sector(&normalize_ticker(&a.ticker)?).await
            }
            MarketTool::AnalyzeVolume => {
                let a: TickerPeriodArgs = self.parse(args)?;
                data.analyze_volume(&normalize_ticker(&a.ticker)?, a.period).await
            }
            MarketTool::GenerateChart => {
                let a: ChartArgs = self.parse(args)?;
                data.generate_chart(&normalize_ticker(&a.ticker)?, &a.request).await
            }
        }
    }
}

/// Registers every [`MarketTool`], in order, backed by `analytics`.
pub fn register_market_tools(registry: &mut ToolRegistry, analytics: Arc<dyn MarketAnalytics>) {
    for tool in MarketTool::ALL {
        registry.register(Arc::new(MarketToolHandler::new(tool, analytics.clone())));
    }
}
