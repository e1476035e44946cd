use serde::{Deserialize, Serialize};

/// A request from the model to invoke a specific tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id assigned by the model for this request.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub arguments: serde_json::Value,
}

/// The outcome of dispatching a [`ToolCall`].
///
/// Failures are data here: a failed dispatch still produces a result whose
/// `content` is `{"error": "..."}` and `is_error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The id of the [`ToolCall`] this result corresponds to.
    pub call_id: String,
    /// Structured output produced by the tool.
    pub content: serde_json::Value,
    /// Whether the dispatch ended in an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful tool result.
    pub fn success(call_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            content,
            is_error: false,
        }
    }

    /// Creates an error tool result carrying `{"error": message}`.
    pub fn error(call_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            call_id: call_id.into(),
            content: serde_json::json!({ "error": message.to_string() }),
            is_error: true,
        }
    }
}
