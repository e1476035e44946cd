use async_trait::async_trait;
use marketlens_core::{ChartPoint, ChartStyle, MarketlensError, MarketlensResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_TICKER_LEN: usize = 20;

/// Trims and uppercases a ticker symbol and checks it is safe to use as a file name.
///
/// Accepted symbols use `A-Z`, `0-9`, `.`, `_` and `-`, never contain `..` and never
/// start with a dot.
pub fn normalize_ticker(ticker: &str) -> MarketlensResult<String> {
    let t = ticker.trim().to_ascii_uppercase();
    if t.is_empty() {
        return Err(MarketlensError::Tool("ticker must not be empty".into()));
    }
    let valid = t.len() <= MAX_TICKER_LEN
        && !t.starts_with('.')
        && !t.contains("..")
        && t
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(MarketlensError::Tool(format!("invalid ticker symbol '{ticker}'")));
    }
    Ok(t)
}

/// Look-back window of a request, measured from the newest data point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[default]
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
}

impl Period {
    /// Calendar days covered by the period.
    pub fn days(&self) -> i64 {
        match self {
            Period::OneMonth => 30,
            Period::ThreeMonths => 90,
            Period::SixMonths => 180,
            Period::OneYear => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneMonth => "1M",
            Period::ThreeMonths => "3M",
            Period::SixMonths => "6M",
            Period::OneYear => "1Y",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = MarketlensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1M" => Ok(Period::OneMonth),
            "3M" => Ok(Period::ThreeMonths),
            "6M" => Ok(Period::SixMonths),
            "1Y" => Ok(Period::OneYear),
            other => Err(MarketlensError::Tool(format!("unsupported period '{other}'"))),
        }
    }
}

/// Which pattern families to scan for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternScope {
    Candlestick,
    Chart,
    #[default]
    Both,
}

/// How support/resistance levels are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelMethod {
    Pivot,
    Fibonacci,
    #[default]
    Both,
}

/// Arguments of a chart rendering request issued by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    #[serde(default)]
    pub period: Period,
    #[serde(default)]
    pub overlays: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub style: ChartStyle,
}

fn unsupported(operation: &str) -> MarketlensError {
    MarketlensError::Tool(format!("{operation} is not supported by this data source"))
}

/// The technical-analysis collaborator the market tools delegate to.
///
/// Every operation defaults to a tool error so a data source only implements
/// what it can actually compute; the agent sees the failure as an observation.
#[async_trait]
pub trait MarketAnalytics: Send + Sync {
    async fn load_stock_data(
        &self,
        _ticker: &str,
        _period: Period,
    ) -> MarketlensResult<serde_json::Value> {
        Err(unsupported("load_stock_data"))
    }

    async fn calculate_indicator(
        &self,
        _ticker: &str,
        _indicator: &str,
        _params: &serde_json::Value,
    ) -> MarketlensResult<serde_json::Value> {
        Err(unsupported("calculate_indicator"))
    }

    async fn detect_patterns(
        &self,
        _ticker: &str,
        _scope: PatternScope,
    ) -> MarketlensResult<serde_json::Value> {
        Err(unsupported("detect_patterns"))
    }

    async fn find_support_resistance(
        &self,
        _ticker: &str,
        _method: LevelMethod,
    ) -> MarketlensResult<serde_json::Value> {
        Err(unsupported("find_support_resistance"))
    }

    async fn compare_with_index(
        &self,
        _ticker: &str,
        _period: Period,
    ) -> MarketlensResult<serde_json::Value> {
        Err(unsupported("compare_with_index"))
    }

    async fn compare_with_sector(&self, _ticker: &str) -> MarketlensResult<serde_json::Value> {
        Err(unsupported("compare_with_sector"))
    }

    async fn analyze_volume(
        &self,
        _ticker: &str,
        _period: Period,
    ) -> MarketlensResult<serde_json::Value> {
        Err(unsupported("analyze_volume"))
    }

    async fn generate_chart(
        &self,
        _ticker: &str,
        _request: &ChartRequest,
    ) -> MarketlensResult<serde_json::Value> {
        Err(unsupported("generate_chart"))
    }

    /// Ordered price series (plus any indicator columns) for the report chart.
    async fn chart_series(&self, _ticker: &str, _period: Period) -> MarketlensResult<Vec<ChartPoint>> {
        Err(unsupported("chart_series"))
    }

    /// Tickers this source holds data for, sorted. Sources that cannot enumerate
    /// their symbols report none.
    async fn available_tickers(&self) -> MarketlensResult<Vec<String>> {
        Ok(Vec::new())
    }
}
