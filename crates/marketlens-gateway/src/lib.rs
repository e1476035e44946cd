//! HTTP surface of MarketLens.
//!
//! Analyses are streamed as server-sent events, one event per run step; finished
//! reports are served from the configured [`marketlens_agent::ReportStore`].

pub mod api;
pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, GatewayServer};
