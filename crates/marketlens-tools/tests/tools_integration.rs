#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests: CSV data source behind the registered market tools.

use marketlens_core::ToolCall;
use marketlens_tools::{register_market_tools, CsvMarketData, MarketAnalytics, Period, ToolRegistry};
use serde_json::json;
use std::sync::Arc;

fn write_fixture(dir: &std::path::Path) {
    let mut csv = String::from("Date,Open,High,Low,Close,Volume\n");
    // 400 daily rows ending 2024-06-30, price climbing 0.1 per day from 100.
    let end = chrono::NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    for i in (0..400).rev() {
        let date = end - chrono::Duration::days(i);
        let close = 100.0 + (399 - i) as f64 * 0.1;
        csv.push_str(&format!(
            "{},{:.2},{:.2},{:.2},{:.2},{}\n",
            date.format("%Y-%m-%d"),
            close - 0.5,
            close + 1.0,
            close - 1.0,
            close,
            1_000_000 + i * 10,
        ));
    }
    std::fs::write(dir.join("OGDC.csv"), csv).unwrap();
}

fn registry_over(dir: &std::path::Path) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_market_tools(&mut registry, Arc::new(CsvMarketData::new(dir)));
    registry
}

#[tokio::test]
async fn load_stock_data_summarizes_the_period() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let registry = registry_over(dir.path());

    let out = registry
        .dispatch("load_stock_data", json!({"ticker": "ogdc", "period": "1M"}))
        .await
        .unwrap();

    assert_eq!(out["ticker"], "OGDC");
    assert_eq!(out["period"], "1M");
    // 30-day cut-off is inclusive of the boundary day.
    assert_eq!(out["data_points"], 31);
    assert_eq!(out["current_price"], 139.9);
    assert_eq!(out["price_change"], 3.0);
    assert_eq!(out["last_5_days"].as_array().unwrap().len(), 5);
    assert_eq!(out["last_5_days"][4]["date"], "2024-06-30");
    let summary = out["summary"].as_str().unwrap();
    assert!(summary.starts_with("OGDC: Current PKR 139.90, up"), "{summary}");
}

#[tokio::test]
async fn missing_ticker_becomes_an_error_observation() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_over(dir.path());

    let result = registry
        .dispatch_call(&ToolCall {
            id: "toolu_1".into(),
            name: "load_stock_data".into(),
            arguments: json!({"ticker": "LUCK"}),
        })
        .await;

    assert!(result.is_error);
    assert_eq!(result.call_id, "toolu_1");
    assert!(result.content["error"].as_str().unwrap().contains("LUCK"));
}

#[tokio::test]
async fn tickers_cannot_reach_outside_the_data_dir() {
    let root = tempfile::tempdir().unwrap();
    let data_dir = root.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    std::fs::write(
        root.path().join("SECRET.csv"),
        "Date,Open,High,Low,Close,Volume\n2024-01-02,1,1,1,1,1\n",
    )
    .unwrap();

    let data = CsvMarketData::new(&data_dir);
    let err = data.load_stock_data("../SECRET", Period::SixMonths).await.unwrap_err();
    assert!(err.to_string().contains("invalid ticker"), "{err}");

    let registry = registry_over(&data_dir);
    let result = registry
        .dispatch_call(&ToolCall {
            id: "toolu_2".into(),
            name: "load_stock_data".into(),
            arguments: json!({"ticker": "../secret"}),
        })
        .await;
    assert!(result.is_error);
    assert!(result.content["error"].as_str().unwrap().contains("invalid ticker"));
}

#[tokio::test]
async fn unsupported_operations_fail_softly() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let registry = registry_over(dir.path());

    let result = registry
        .dispatch_call(&ToolCall {
            id: "call_9".into(),
            name: "calculate_indicator".into(),
            arguments: json!({"ticker": "OGDC", "indicator": "RSI"}),
        })
        .await;
    assert!(result.is_error);
    assert!(result.content["error"]
        .as_str()
        .unwrap()
        .contains("not supported"));
}

#[tokio::test]
async fn chart_series_is_ordered_and_cut_to_period() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let data = CsvMarketData::new(dir.path());

    let series = data.chart_series("OGDC", Period::OneYear).await.unwrap();
    assert_eq!(series.len(), 366);
    assert!(series.windows(2).all(|w| w[0].date < w[1].date));
    assert_eq!(series.last().unwrap().date, "2024-06-30");
}

#[test]
fn schemas_cover_all_market_tools_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_over(dir.path());
    let names: Vec<_> = registry.schemas().into_iter().map(|d| d.name).collect();
    assert_eq!(
        names,
        vec![
            "load_stock_data",
            "calculate_indicator",
            "detect_patterns",
            "find_support_resistance",
            "compare_with_index",
            "compare_with_sector",
            "analyze_volume",
            "generate_chart",
        ]
    );
}
