#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, TimeZone, Utc};
use marketlens_agent::{ChartArtifact, ReportRecord, ReportStore};
use marketlens_core::{AnalysisResult, Signal, Step, ToolCall, ToolResult};
use marketlens_store::FileReportStore;
use serde_json::json;

/// Helper: create a FileReportStore in a temp directory.
async fn temp_store() -> (FileReportStore, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileReportStore::new(tmp.path().join("reports_root"))
        .await
        .unwrap();
    (store, tmp)
}

fn analysis(ticker: &str, signal: &str) -> AnalysisResult {
    let text = json!({
        "thesis": format!("{ticker} thesis"),
        "signal": signal,
        "confidence": "LOW",
        "summary": "Range-bound.",
        "detailed_analysis": {
            "trend": "Sideways", "momentum": "RSI 50", "key_levels": "100/120",
            "volume_context": "Thin", "market_context": "Lagging KSE-100"
        },
        "key_levels": {"support": [100], "resistance": [120], "stop_loss": 95, "target": 125},
        "evidence_chain": [],
        "risk_factors": [],
        "final_commentary": "Wait for a breakout.",
        "chart_config": {}
    })
    .to_string();
    AnalysisResult::from_model_text(&text, ticker).unwrap()
}

fn record(id: &str, ticker: &str, minutes_ago: i64) -> ReportRecord {
    let generated_at = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap() - Duration::minutes(minutes_ago);
    ReportRecord {
        id: id.into(),
        ticker: ticker.into(),
        generated_at,
        analysis: analysis(ticker, "NEUTRAL"),
        reasoning_trace: vec![Step::reasoning(1, "Looking at the range.")],
        tool_calls_count: 0,
        execution_time_ms: 1_250,
        chart: ChartArtifact::default(),
        document_path: None,
    }
}

#[tokio::test]
async fn save_and_get_report() {
    let (store, _tmp) = temp_store().await;
    let rec = record("rpt_0000aaaa", "OGDC", 0);

    store.save_report(&rec).await.unwrap();

    let loaded = store.get_report("rpt_0000aaaa").await.unwrap().unwrap();
    assert_eq!(loaded, rec);
    assert_eq!(loaded.analysis.signal, Signal::Neutral);
    assert_eq!(loaded.analysis.chart_config.ticker, "OGDC");
}

#[tokio::test]
async fn get_nonexistent_returns_none() {
    let (store, _tmp) = temp_store().await;
    assert!(store.get_report("rpt_deadbeef").await.unwrap().is_none());
}

#[tokio::test]
async fn list_is_newest_first_and_filtered() {
    let (store, _tmp) = temp_store().await;
    store.save_report(&record("rpt_00000001", "OGDC", 30)).await.unwrap();
    store.save_report(&record("rpt_00000002", "HBL", 20)).await.unwrap();
    store.save_report(&record("rpt_00000003", "OGDC", 10)).await.unwrap();

    let all = store.list_reports(10, None).await.unwrap();
    let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["rpt_00000003", "rpt_00000002", "rpt_00000001"]);

    let ogdc = store.list_reports(10, Some("ogdc")).await.unwrap();
    assert_eq!(ogdc.len(), 2);
    assert!(ogdc.iter().all(|s| s.ticker == "OGDC"));

    let limited = store.list_reports(1, None).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, "rpt_00000003");
    assert_eq!(limited[0].thesis, "OGDC thesis");
}

#[tokio::test]
async fn unreadable_report_is_skipped_in_listing() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileReportStore::new(tmp.path()).await.unwrap();
    store.save_report(&record("rpt_00000001", "OGDC", 0)).await.unwrap();
    std::fs::write(tmp.path().join("reports/rpt_broken.json"), "{not json").unwrap();

    let listed = store.list_reports(10, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(store.get_report("rpt_broken").await.is_err());
}

#[tokio::test]
async fn steps_are_stored_in_order() {
    let (store, _tmp) = temp_store().await;
    let call = ToolCall {
        id: "toolu_1".into(),
        name: "load_stock_data".into(),
        arguments: json!({"ticker": "OGDC"}),
    };
    let steps = vec![
        Step::reasoning(1, "Start."),
        Step::tool_call(1, &call),
        Step::observation(1, &ToolResult::success("toolu_1", json!({"current_price": 120.0}))),
    ];

    // Written out of order on purpose.
    for seq in [2usize, 0, 1] {
        store.save_step("rpt_0000beef", &steps[seq], seq).await.unwrap();
    }

    let loaded = store.load_steps("rpt_0000beef").await.unwrap();
    assert_eq!(loaded, steps);
    assert!(store.load_steps("rpt_unknown").await.unwrap().is_empty());
}

#[tokio::test]
async fn rejects_unsafe_ids_on_write() {
    let (store, _tmp) = temp_store().await;
    let err = store.save_report(&record("../escape", "OGDC", 0)).await.unwrap_err();
    assert!(err.to_string().contains("invalid report id"));
    assert!(store
        .save_step("a/b", &Step::reasoning(1, "x"), 0)
        .await
        .is_err());
}
