//! Tools the MarketLens agent can call.
//!
//! # Main entry points
//!
//! - [`ToolRegistry`] — Ordered name → tool mapping with a single dispatch entry point.
//! - [`register_market_tools()`] — Register the eight market-analysis tools.
//! - [`MarketAnalytics`] — Collaborator trait the tools delegate their computations to.
//! - [`CsvMarketData`] — `MarketAnalytics` backed by per-ticker OHLCV CSV files.
//! - [`StockCatalogue`] — Company names and sectors, and the stock listing built on them.

/// Market data collaborator trait and its parameter types.
pub mod analytics;
/// Listed-company metadata.
pub mod catalogue;
/// CSV-backed market data source.
pub mod csv_data;
/// The market-analysis tools.
pub mod market;
/// Tool registry.
pub mod registry;
/// Tool trait and descriptor.
pub mod tool;

pub use analytics::{
    normalize_ticker, ChartRequest, LevelMethod, MarketAnalytics, PatternScope, Period,
};
pub use catalogue::{StockCatalogue, StockEntry, StockInfo};
pub use csv_data::CsvMarketData;
pub use market::{register_market_tools, MarketTool, MarketToolHandler};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolDescriptor};
