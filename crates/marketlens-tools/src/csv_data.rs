use crate::analytics::{normalize_ticker, MarketAnalytics, Period};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use marketlens_core::{ChartPoint, MarketlensError, MarketlensResult};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const REQUIRED_COLUMNS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

/// One daily bar.
#[derive(Debug, Clone, PartialEq)]
struct Bar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

/// Market data read from `{data_dir}/{TICKER}.csv` files.
///
/// Files need a header with `Date,Open,High,Low,Close,Volume` (any column order,
/// extra columns ignored) and `YYYY-MM-DD` dates. Only raw price data is served;
/// indicator maths is left to other [`MarketAnalytics`] implementations.
pub struct CsvMarketData {
    data_dir: PathBuf,
}

impl CsvMarketData {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{ticker}.csv"))
    }

    /// Bars within `period` of the newest bar, oldest first.
    async fn load_bars(&self, ticker: &str, period: Period) -> MarketlensResult<Vec<Bar>> {
        let ticker = normalize_ticker(ticker)?;
        let path = self.csv_path(&ticker);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            MarketlensError::Tool(format!("data file not found for {ticker} ({}): {e}", path.display()))
        })?;

        let mut bars = parse_csv(&raw)?;
        bars.sort_by_key(|b| b.date);

        let newest = bars
            .last()
            .map(|b| b.date)
            .ok_or_else(|| MarketlensError::Tool(format!("no rows in data file for {ticker}")))?;
        let cutoff = newest - Duration::days(period.days());
        bars.retain(|b| b.date >= cutoff);

        debug!(ticker = %ticker, period = %period, bars = bars.len(), "Loaded price data");
        Ok(bars)
    }
}

/// One CSV record. Empty cells decode as `None`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Open")]
    open: Option<f64>,
    #[serde(rename = "High")]
    high: Option<f64>,
    #[serde(rename = "Low")]
    low: Option<f64>,
    #[serde(rename = "Close")]
    close: Option<f64>,
    #[serde(rename = "Volume")]
    volume: Option<f64>,
}

impl CsvRow {
    /// Rows without a date or close are unusable and yield `None`; missing open, high
    /// and low take the close, missing volume is zero.
    fn into_bar(self, line: usize) -> MarketlensResult<Option<Bar>> {
        let (Some(date), Some(close)) = (self.date.filter(|d| !d.is_empty()), self.close) else {
            return Ok(None);
        };
        // Accept `2024-01-02`, `2024-01-02 00:00:00` and `2024-01-02T00:00:00`.
        let day = date.split([' ', 'T']).next().unwrap_or_default();
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|e| MarketlensError::Tool(format!("row {line}: bad Date '{date}': {e}")))?;
        Ok(Some(Bar {
            date,
            open: self.open.unwrap_or(close),
            high: self.high.unwrap_or(close),
            low: self.low.unwrap_or(close),
            close,
            volume: self.volume.unwrap_or(0.0).max(0.0).round() as u64,
        }))
    }
}

fn parse_csv(raw: &str) -> MarketlensResult<Vec<Bar>> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let header = reader
        .headers()
        .map_err(|e| MarketlensError::Tool(format!("unreadable CSV header: {e}")))?
        .clone();
    if header.is_empty() {
        return Err(MarketlensError::Tool("empty data file".into()));
    }
    for name in REQUIRED_COLUMNS {
        if !header.iter().any(|h| h == name) {
            let found: Vec<&str> = header.iter().collect();
            return Err(MarketlensError::Tool(format!(
                "CSV missing required column {name}. Found: {found:?}"
            )));
        }
    }

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let line = i + 2;
        let row = row.map_err(|e| MarketlensError::Tool(format!("row {line}: {e}")))?;
        match row.into_bar(line)? {
            Some(bar) => bars.push(bar),
            None => debug!(row = line, "Skipping row without date or close"),
        }
    }
    Ok(bars)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn bar_json(b: &Bar) -> serde_json::Value {
    json!({
        "date": b.date.format("%Y-%m-%d").to_string(),
        "open": b.open,
        "high": b.high,
        "low": b.low,
        "close": b.close,
        "volume": b.volume,
    })
}

#[async_trait]
impl MarketAnalytics for CsvMarketData {
    async fn load_stock_data(
        &self,
        ticker: &str,
        period: Period,
    ) -> MarketlensResult<serde_json::Value> {
        let bars = self.load_bars(ticker, period).await?;
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(MarketlensError::Tool(format!(
                    "no data for {ticker} in period {period}"
                )))
            }
        };

        let current_price = last.close;
        let price_change = current_price - first.close;
        let change_percent = if first.close != 0.0 {
            price_change / first.close * 100.0
        } else {
            0.0
        };
        let period_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let period_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let avg_volume = bars.iter().map(|b| b.volume).sum::<u64>() / bars.len() as u64;
        let last_5_days: Vec<_> = bars.iter().rev().take(5).rev().map(bar_json).collect();

        let summary = format!(
            "{ticker}: Current PKR {current_price:.2}, {} {:.1}% over {period}. \
             Range: {period_low:.0}-{period_high:.0}. Avg volume: {:.1}M shares/day.",
            if price_change >= 0.0 { "up" } else { "down" },
            change_percent.abs(),
            avg_volume as f64 / 1_000_000.0,
        );

        Ok(json!({
            "ticker": ticker,
            "period": period,
            "current_price": round2(current_price),
            "price_change": round2(price_change),
            "change_percent": round2(change_percent),
            "period_high": round2(period_high),
            "period_low": round2(period_low),
            "avg_volume": avg_volume,
            "data_points": bars.len(),
            "last_5_days": last_5_days,
            "summary": summary,
        }))
    }

    async fn chart_series(&self, ticker: &str, period: Period) -> MarketlensResult<Vec<ChartPoint>> {
        let bars = self.load_bars(ticker, period).await?;
        Ok(bars
            .iter()
            .map(|b| ChartPoint {
                date: b.date.format("%Y-%m-%d").to_string(),
                open: round2(b.open),
                high: round2(b.high),
                low: round2(b.low),
                close: round2(b.close),
                volume: b.volume,
                indicators: BTreeMap::new(),
            })
            .collect())
    }

    async fn available_tickers(&self) -> MarketlensResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut tickers = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            // Only files whose stem is already a canonical symbol are served.
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if normalize_ticker(stem).is_ok_and(|t| t == stem) {
                    tickers.push(stem.to_string());
                }
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn header_order_is_free() {
        let raw = "Volume,Date,Close,Open,Low,High\n1000,2024-01-02,10.5,10,9.5,11\n";
        let bars = parse_csv(raw).unwrap();
        assert_eq!(bars[0].open, 10.0);
        assert_eq!(bars[0].high, 11.0);
        assert_eq!(bars[0].volume, 1000);
    }

    #[test]
    fn missing_column_is_reported() {
        let err = parse_csv("Date,Open,High,Low,Close\n2024-01-02,1,1,1,1\n").unwrap_err();
        assert!(err.to_string().contains("Volume"));
    }

    #[test]
    fn bad_row_is_reported_with_line_number() {
        let raw = "Date,Open,High,Low,Close,Volume\n2024-01-02,1,1,1,1,5\n2024-01-03,x,1,1,1,5\n";
        let err = parse_csv(raw).unwrap_err();
        assert!(err.to_string().contains("row 3"), "{err}");
    }

    #[test]
    fn byte_order_mark_and_quotes_are_accepted() {
        let raw = "\u{feff}Date,Open,High,Low,Close,Volume\n\"2024-01-02\",\"10\",\"11\",\"9.5\",\"10.5\",\"1,200\"\n";
        let err = parse_csv(raw).unwrap_err();
        // A thousands separator is still not a number.
        assert!(err.to_string().contains("row 2"), "{err}");

        let raw = "\u{feff}Date,Open,High,Low,Close,Volume\n\"2024-01-02\",\"10\",\"11\",\"9.5\",\"10.5\",\"1200\"\n";
        let bars = parse_csv(raw).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 10.5);
        assert_eq!(bars[0].volume, 1200);
    }

    #[tokio::test]
    async fn data_dir_listing_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["PPL.csv", "OGDC.csv", "notes.txt", "lower.csv", ".hidden.csv"] {
            std::fs::write(dir.path().join(name), "Date,Open,High,Low,Close,Volume\n").unwrap();
        }
        let data = CsvMarketData::new(dir.path());
        assert_eq!(data.available_tickers().await.unwrap(), ["OGDC", "PPL"]);

        let absent = CsvMarketData::new(dir.path().join("absent"));
        assert!(absent.available_tickers().await.unwrap().is_empty());
    }

    #[test]
    fn empty_cells_are_tolerated() {
        let raw = "Date,Open,High,Low,Close,Volume\n\
                   2024-01-02 00:00:00,10,11,9,10.5,\n\
                   2024-01-03,,,,11,700\n\
                   2024-01-04,11,12,10,,900\n\
                   ,11,12,10,11.5,900\n";
        let bars = parse_csv(raw).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].volume, 0);
        assert_eq!(bars[1].open, 11.0);
        assert_eq!(bars[1].low, 11.0);
    }
}
