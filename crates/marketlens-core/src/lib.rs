//! Core types and error definitions for MarketLens.
//!
//! This crate provides the foundational types shared across all MarketLens crates:
//! the error taxonomy, the transcript exchanged with language models, tool call
//! abstractions, the step events a run emits, and the final analysis schema.
//!
//! # Main types
//!
//! - [`MarketlensError`] — Unified error enum for all MarketLens subsystems.
//! - [`MarketlensResult`] — Convenience alias for `Result<T, MarketlensError>`.
//! - [`Transcript`] — Append-only sequence of [`Turn`]s made of [`ContentBlock`]s.
//! - [`ToolCall`] / [`ToolResult`] — A model-issued tool request and its outcome.
//! - [`Step`] — One observable event of an agent run.
//! - [`AnalysisResult`] — The structured research note a successful run produces.

/// Final analysis schema and model-output parsing.
pub mod analysis;
/// Error types.
pub mod error;
/// Transcript model: roles, turns and content blocks.
pub mod message;
/// Step events emitted by an agent run.
pub mod step;
/// Tool invocation request/result types.
pub mod tool;

pub use analysis::{
    AnalysisResult, ChartConfig, ChartPoint, ChartStyle, Confidence, DetailedAnalysis, KeyLevels,
    Signal, TradingStrategy,
};
pub use error::{MarketlensError, MarketlensResult};
pub use message::{ContentBlock, Role, Transcript, Turn};
pub use step::{ErrorCode, Step, StepKind};
pub use tool::{ToolCall, ToolResult};
