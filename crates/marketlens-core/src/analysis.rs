use crate::error::{MarketlensError, MarketlensResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Directional call of the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    /// Upside expected.
    Bullish,
    /// Downside expected.
    Bearish,
    /// No directional edge.
    Neutral,
}

/// How strongly the indicators agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    /// Three or more indicators agree.
    High,
    /// Two indicators agree.
    Medium,
    /// One indicator, or conflicting signals.
    Low,
}

/// Narrative sections of the research note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedAnalysis {
    pub trend: String,
    pub momentum: String,
    pub key_levels: String,
    pub volume_context: String,
    pub market_context: String,
}

/// Price levels the note commits to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyLevels {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
    pub stop_loss: f64,
    pub target: f64,
}

/// Optional trade plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingStrategy {
    pub bias: String,
    #[serde(default)]
    pub entry_zones: Option<Vec<String>>,
    #[serde(default)]
    pub profit_taking: Option<String>,
    #[serde(default)]
    pub invalidation: Option<String>,
}

/// Colour scheme of the rendered chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    #[default]
    Dark,
    Light,
}

/// One bar of the chart series, with whatever indicator values the data source adds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    #[serde(flatten)]
    pub indicators: BTreeMap<String, f64>,
}

/// What the chart attached to the report should show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub ticker: String,
    pub period: String,
    #[serde(default)]
    pub overlays: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub style: ChartStyle,
    /// Price series filled in after parsing; never supplied by the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<ChartPoint>,
}

/// The structured research note produced at the end of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub thesis: String,
    pub signal: Signal,
    pub confidence: Confidence,
    #[serde(default)]
    pub current_price: Option<f64>,
    pub summary: String,
    pub detailed_analysis: DetailedAnalysis,
    pub key_levels: KeyLevels,
    #[serde(default)]
    pub strategy: Option<TradingStrategy>,
    pub evidence_chain: Vec<String>,
    pub risk_factors: Vec<String>,
    pub final_commentary: String,
    pub chart_config: ChartConfig,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    /// Parses the model's end-of-turn text into an analysis.
    ///
    /// The JSON object is taken from the first `{` to the last `}` of `text`. Legacy
    /// field names are mapped onto the current ones and chart defaults are filled from
    /// `ticker` before the shape is validated. Any failure is
    /// [`MarketlensError::InvalidFinalAnswer`]; nothing is repaired beyond those rules.
    pub fn from_model_text(text: &str, ticker: &str) -> MarketlensResult<Self> {
        let raw = extract_json_object(text).ok_or_else(|| {
            MarketlensError::InvalidFinalAnswer("no JSON object in final answer".into())
        })?;

        let mut value: Value = serde_json::from_str(raw)
            .map_err(|e| MarketlensError::InvalidFinalAnswer(format!("malformed JSON: {e}")))?;

        let obj = value.as_object_mut().ok_or_else(|| {
            MarketlensError::InvalidFinalAnswer("final answer is not a JSON object".into())
        })?;
        apply_compat_rules(obj, ticker);

        serde_json::from_value(value)
            .map_err(|e| MarketlensError::InvalidFinalAnswer(format!("missing or invalid field: {e}")))
    }
}

/// Slice of `text` from the first `{` to the last `}`, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn apply_compat_rules(obj: &mut Map<String, Value>, ticker: &str) {
    let mut detailed = take_object(obj, "detailed_analysis");
    for (current, legacy) in [
        ("trend", "price_structure"),
        ("volume_context", "volume"),
        ("market_context", "market_relative"),
    ] {
        if !detailed.contains_key(current) {
            if let Some(v) = detailed.get(legacy).cloned() {
                detailed.insert(current.to_string(), v);
            }
        }
    }
    obj.insert("detailed_analysis".into(), Value::Object(detailed));

    let mut levels = take_object(obj, "key_levels");
    if !levels.contains_key("support") {
        let merged = first_two(&levels, &["immediate_support", "secondary_support"]);
        levels.insert("support".into(), merged);
    }
    if !levels.contains_key("resistance") {
        let merged = first_two(&levels, &["immediate_resistance", "targets"]);
        levels.insert("resistance".into(), merged);
    }
    if !levels.contains_key("target") {
        let first_target = levels
            .get("targets")
            .and_then(Value::as_array)
            .and_then(|t| t.first().cloned())
            .unwrap_or_else(|| Value::from(0));
        levels.insert("target".into(), first_target);
    }
    levels
        .entry("stop_loss")
        .or_insert_with(|| Value::from(0));
    obj.insert("key_levels".into(), Value::Object(levels));

    if !obj.contains_key("final_commentary") {
        if let Some(summary) = obj.get("summary").cloned() {
            obj.insert("final_commentary".into(), summary);
        }
    }

    let mut chart = take_object(obj, "chart_config");
    chart
        .entry("ticker")
        .or_insert_with(|| Value::from(ticker));
    chart.entry("period").or_insert_with(|| Value::from("6M"));
    chart.entry("style").or_insert_with(|| Value::from("dark"));
    // The series is attached by the runner, not trusted from the model.
    chart.remove("data");
    obj.insert("chart_config".into(), Value::Object(chart));

    // Stamped when the report is finalized.
    obj.remove("generated_at");
}

/// Removes `key` from `obj`, yielding its object or `{}` for anything else.
fn take_object(obj: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match obj.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn first_two(levels: &Map<String, Value>, keys: &[&str]) -> Value {
    let merged: Vec<Value> = keys
        .iter()
        .filter_map(|k| levels.get(*k).and_then(Value::as_array))
        .flatten()
        .take(2)
        .cloned()
        .collect();
    Value::Array(merged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn full_answer() -> Value {
        serde_json::json!({
            "thesis": "Positive Trend with Near-Term Headwinds",
            "signal": "BULLISH",
            "confidence": "MEDIUM",
            "current_price": 321.18,
            "summary": "OGDC holds its rising channel.",
            "detailed_analysis": {
                "trend": "Rising channel, support at 305",
                "momentum": "RSI 72, mild divergence",
                "key_levels": "305-300 support, 336 resistance",
                "volume_context": "Volume 1.4x average",
                "market_context": "Outperforming KSE-100"
            },
            "key_levels": {
                "support": [305.0, 300.0],
                "resistance": [336.0, 340.0],
                "stop_loss": 265.0,
                "target": 358.0
            },
            "evidence_chain": ["Price consolidated below 336"],
            "risk_factors": ["Near-term overbought"],
            "final_commentary": "Strategy favors buying dips into 305.",
            "chart_config": {
                "ticker": "OGDC",
                "period": "6M",
                "overlays": ["SMA(9)"],
                "annotations": ["Support"],
                "style": "dark"
            }
        })
    }

    #[test]
    fn parses_answer_wrapped_in_prose() {
        let text = format!("Here is my analysis:\n```json\n{}\n```\nDone.", full_answer());
        let result = AnalysisResult::from_model_text(&text, "OGDC").unwrap();
        assert_eq!(result.signal, Signal::Bullish);
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.key_levels.support, vec![305.0, 300.0]);
        assert_eq!(result.chart_config.style, ChartStyle::Dark);
        assert_eq!(result.current_price, Some(321.18));
    }

    #[test]
    fn rejects_text_without_json() {
        let err = AnalysisResult::from_model_text("I could not finish the analysis.", "OGDC")
            .unwrap_err();
        assert!(matches!(err, MarketlensError::InvalidFinalAnswer(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AnalysisResult::from_model_text("{\"thesis\": \"x\",}", "OGDC").unwrap_err();
        assert!(matches!(err, MarketlensError::InvalidFinalAnswer(_)));
    }

    #[test]
    fn rejects_unknown_signal() {
        let mut answer = full_answer();
        answer["signal"] = Value::from("STRONG BUY");
        let err = AnalysisResult::from_model_text(&answer.to_string(), "OGDC").unwrap_err();
        assert!(matches!(err, MarketlensError::InvalidFinalAnswer(_)));
    }

    #[test]
    fn maps_legacy_detailed_analysis_names() {
        let mut answer = full_answer();
        answer["detailed_analysis"] = serde_json::json!({
            "price_structure": "Rising channel",
            "momentum": "RSI 61",
            "key_levels": "305 / 336",
            "volume": "Below average",
            "market_relative": "In line with KSE-100"
        });
        let result = AnalysisResult::from_model_text(&answer.to_string(), "OGDC").unwrap();
        assert_eq!(result.detailed_analysis.trend, "Rising channel");
        assert_eq!(result.detailed_analysis.volume_context, "Below average");
        assert_eq!(result.detailed_analysis.market_context, "In line with KSE-100");
    }

    #[test]
    fn current_name_wins_over_legacy_name() {
        let mut answer = full_answer();
        answer["detailed_analysis"]["price_structure"] = Value::from("legacy");
        let result = AnalysisResult::from_model_text(&answer.to_string(), "OGDC").unwrap();
        assert_eq!(result.detailed_analysis.trend, "Rising channel, support at 305");
    }

    #[test]
    fn maps_legacy_key_levels() {
        let mut answer = full_answer();
        answer["key_levels"] = serde_json::json!({
            "immediate_support": [305.0],
            "secondary_support": [280.0, 275.0],
            "immediate_resistance": [336.0],
            "targets": [358.0, 370.0]
        });
        let result = AnalysisResult::from_model_text(&answer.to_string(), "OGDC").unwrap();
        assert_eq!(result.key_levels.support, vec![305.0, 280.0]);
        assert_eq!(result.key_levels.resistance, vec![336.0, 358.0]);
        assert_eq!(result.key_levels.target, 358.0);
        assert_eq!(result.key_levels.stop_loss, 0.0);
    }

    #[test]
    fn fills_commentary_and_chart_defaults() {
        let mut answer = full_answer();
        let obj = answer.as_object_mut().unwrap();
        obj.remove("final_commentary");
        obj.remove("chart_config");
        let result = AnalysisResult::from_model_text(&answer.to_string(), "LUCK").unwrap();
        assert_eq!(result.final_commentary, "OGDC holds its rising channel.");
        assert_eq!(result.chart_config.ticker, "LUCK");
        assert_eq!(result.chart_config.period, "6M");
        assert!(result.chart_config.overlays.is_empty());
    }

    #[test]
    fn missing_required_narrative_field_fails() {
        let mut answer = full_answer();
        answer["detailed_analysis"]
            .as_object_mut()
            .unwrap()
            .remove("momentum");
        let err = AnalysisResult::from_model_text(&answer.to_string(), "OGDC").unwrap_err();
        assert!(matches!(err, MarketlensError::InvalidFinalAnswer(_)));
    }

    #[test]
    fn model_supplied_timestamp_is_ignored() {
        for stamp in ["2024-01-15", "yesterday", "2024-01-15T09:30:00Z"] {
            let mut answer = full_answer();
            answer["generated_at"] = Value::from(stamp);
            let result = AnalysisResult::from_model_text(&answer.to_string(), "OGDC").unwrap();
            assert!(result.generated_at.is_none());
        }
    }

    #[test]
    fn model_supplied_series_is_discarded() {
        let mut answer = full_answer();
        answer["chart_config"]["data"] = serde_json::json!([{"date": "2024-01-01"}]);
        let result = AnalysisResult::from_model_text(&answer.to_string(), "OGDC").unwrap();
        assert!(result.chart_config.data.is_empty());
    }
}
