use marketlens_core::{ContentBlock, ToolCall};
use serde::{Deserialize, Serialize};

/// Why the model stopped producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model considers its answer final.
    EndOfTurn,
    /// The model is waiting for tool results.
    ToolUseRequested,
    /// Output was cut off by the token limit.
    Truncated,
}

/// A model turn in vendor-neutral form.
///
/// `content` holds only text and tool-use blocks, in the order the vendor returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTurn {
    pub content: Vec<ContentBlock>,
    pub stop: StopReason,
    /// Name of the backend that produced the turn.
    pub backend: String,
    /// Model id reported by the vendor.
    pub model: String,
}

impl NormalizedTurn {
    pub fn new(content: Vec<ContentBlock>, stop: StopReason) -> Self {
        Self {
            content,
            stop,
            backend: String::new(),
            model: String::new(),
        }
    }

    /// All text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool requests in block order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(ContentBlock::as_tool_call)
            .collect()
    }
}
