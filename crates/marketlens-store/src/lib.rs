//! Report persistence for MarketLens.
//!
//! [`FileReportStore`] implements the agent's [`marketlens_agent::ReportStore`]
//! collaborator with plain JSON files, keyed by run id.

pub mod store;

pub use store::FileReportStore;
