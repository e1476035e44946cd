use crate::analysis::AnalysisResult;
use crate::tool::{ToolCall, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a run failed. Carried by the terminal [`StepKind::Error`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// The wall-clock budget ran out at an iteration boundary.
    RunTimeout,
    /// No backend could produce a model turn.
    ProviderUnavailable,
    /// The end-of-turn text did not parse into an analysis.
    InvalidFinalAnswer,
    /// The final report could not be stored.
    PersistenceFailure,
    /// `max_iterations` turns passed without a final answer.
    IterationLimitExceeded,
}

impl ErrorCode {
    /// The wire name, e.g. `run-timeout`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RunTimeout => "run-timeout",
            ErrorCode::ProviderUnavailable => "provider-unavailable",
            ErrorCode::InvalidFinalAnswer => "invalid-final-answer",
            ErrorCode::PersistenceFailure => "persistence-failure",
            ErrorCode::IterationLimitExceeded => "iteration-limit-exceeded",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant payload of a [`Step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Text the model produced while working.
    Reasoning {
        content: String,
    },
    /// The model asked for a tool.
    ToolCall {
        tool: String,
        args: serde_json::Value,
        call_id: String,
    },
    /// What a tool returned (or `{"error": ...}`).
    Observation {
        call_id: String,
        result: serde_json::Value,
    },
    /// The run finished with an analysis.
    Complete {
        run_id: String,
        analysis: Box<AnalysisResult>,
        execution_time_ms: u64,
        tool_calls_count: u32,
    },
    /// The run failed.
    Error {
        code: ErrorCode,
        message: String,
    },
}

/// One observable event of a run.
///
/// Serializes as `{"type": ..., "iteration": ..., "timestamp": ..., <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Iteration the step belongs to, starting at 1.
    pub iteration: u32,
    /// When the step was recorded.
    pub timestamp: DateTime<Utc>,
    /// Variant payload.
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    /// Creates a step stamped with the current time.
    pub fn new(iteration: u32, kind: StepKind) -> Self {
        Self {
            iteration,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn reasoning(iteration: u32, content: impl Into<String>) -> Self {
        Self::new(
            iteration,
            StepKind::Reasoning {
                content: content.into(),
            },
        )
    }

    pub fn tool_call(iteration: u32, call: &ToolCall) -> Self {
        Self::new(
            iteration,
            StepKind::ToolCall {
                tool: call.name.clone(),
                args: call.arguments.clone(),
                call_id: call.id.clone(),
            },
        )
    }

    pub fn observation(iteration: u32, result: &ToolResult) -> Self {
        Self::new(
            iteration,
            StepKind::Observation {
                call_id: result.call_id.clone(),
                result: result.content.clone(),
            },
        )
    }

    pub fn error(iteration: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            iteration,
            StepKind::Error {
                code,
                message: message.into(),
            },
        )
    }

    /// Whether this step ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, StepKind::Complete { .. } | StepKind::Error { .. })
    }

    /// The `type` tag, used as the SSE event name.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            StepKind::Reasoning { .. } => "reasoning",
            StepKind::ToolCall { .. } => "tool_call",
            StepKind::Observation { .. } => "observation",
            StepKind::Complete { .. } => "complete",
            StepKind::Error { .. } => "error",
        }
    }

    /// The error code if this is an error step.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.kind {
            StepKind::Error { code, .. } => Some(*code),
            _ => None,
        }
    }
}
