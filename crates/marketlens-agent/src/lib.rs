//! Agent execution engine for MarketLens.
//!
//! [`AgentRunner`] drives the tool-using loop for one ticker and reports progress as a
//! [`StepStream`]. Model turns come from a [`ProviderGateway`], which hides the two vendor
//! APIs behind [`backends::LlmBackend`] and applies the retry-then-failover policy.

pub mod backends;
pub mod config;
pub mod gateway;
pub mod llm;
pub mod prompt;
pub mod report;
pub mod runner;
pub mod stream;

pub use config::{GatewayConfig, LlmProvider, ModelConfig, RetryPolicy, RunLimits};
pub use gateway::ProviderGateway;
pub use llm::{NormalizedTurn, StopReason};
pub use report::{
    ChartArtifact, ChartRenderer, DocumentRenderer, NullRenderer, ReportRecord, ReportStore,
    ReportSummary,
};
pub use runner::AgentRunner;
pub use stream::StepStream;
