use crate::analytics::{normalize_ticker, MarketAnalytics, Period};
use marketlens_core::MarketlensResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Display metadata for one listed company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

/// One row of the stock listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub current_price: f64,
    pub change_percent: f64,
    /// Date of the newest bar, `YYYY-MM-DD`.
    pub last_updated: String,
}

/// Company metadata keyed by canonical ticker.
#[derive(Debug, Clone, Default)]
pub struct StockCatalogue {
    stocks: BTreeMap<String, StockInfo>,
}

impl StockCatalogue {
    /// Builds the catalogue, normalizing keys. Entries with an unusable symbol are
    /// dropped with a log line.
    pub fn new(stocks: impl IntoIterator<Item = (String, StockInfo)>) -> Self {
        let stocks = stocks
            .into_iter()
            .filter_map(|(ticker, info)| match normalize_ticker(&ticker) {
                Ok(t) => Some((t, info)),
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "Ignoring catalogue entry");
                    None
                }
            })
            .collect();
        Self { stocks }
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    /// Metadata for a canonical ticker, empty when the stock is not catalogued.
    pub fn info(&self, ticker: &str) -> StockInfo {
        self.stocks.get(ticker).cloned().unwrap_or_default()
    }

    /// Every catalogued or data-backed stock that currently has prices, sorted by
    /// ticker. Stocks whose data cannot be loaded are left out.
    pub async fn listing(&self, data: &dyn MarketAnalytics) -> MarketlensResult<Vec<StockEntry>> {
        let mut tickers: BTreeSet<String> = self.stocks.keys().cloned().collect();
        tickers.extend(data.available_tickers().await?);

        let mut entries = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let summary = match data.load_stock_data(&ticker, Period::OneMonth).await {
                Ok(summary) => summary,
                Err(e) => {
                    debug!(ticker = %ticker, error = %e, "Leaving stock out of listing");
                    continue;
                }
            };
            let info = self.info(&ticker);
            entries.push(StockEntry {
                current_price: summary["current_price"].as_f64().unwrap_or_default(),
                change_percent: summary["change_percent"].as_f64().unwrap_or_default(),
                last_updated: summary["last_5_days"]
                    .as_array()
                    .and_then(|days| days.last())
                    .and_then(|day| day["date"].as_str())
                    .unwrap_or_default()
                    .to_string(),
                name: info.name,
                sector: info.sector,
                ticker,
            });
        }
        Ok(entries)
    }
}
