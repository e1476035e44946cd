use crate::tool::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// The role of the participant that authored a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller, including tool results fed back to the model.
    User,
    /// The language model.
    Assistant,
}

/// One block of content inside a [`Turn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Free text.
    Text {
        /// The text itself.
        text: String,
    },
    /// A tool-invocation request issued by the model.
    ToolUse {
        /// Correlation id.
        id: String,
        /// Tool name.
        name: String,
        /// Structured arguments.
        input: serde_json::Value,
    },
    /// The result of a tool invocation, correlated by `tool_use_id`.
    ToolResult {
        /// Id of the [`ContentBlock::ToolUse`] this answers.
        tool_use_id: String,
        /// Structured result (or `{"error": ...}`).
        content: serde_json::Value,
        /// Whether the dispatch failed.
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Creates a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Creates a tool-use block from a [`ToolCall`].
    pub fn tool_use(call: &ToolCall) -> Self {
        ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        }
    }

    /// Returns the text if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Returns the request as a [`ToolCall`] if this is a tool-use block.
    pub fn as_tool_call(&self) -> Option<ToolCall> {
        match self {
            ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: input.clone(),
            }),
            _ => None,
        }
    }
}

impl From<ToolResult> for ContentBlock {
    fn from(result: ToolResult) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: result.call_id,
            content: result.content,
            is_error: result.is_error,
        }
    }
}

/// One request/response unit of a [`Transcript`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn.
    pub role: Role,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

impl Turn {
    /// A user turn holding a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// An assistant turn holding the given blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A user turn carrying tool results, in dispatch order.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::from).collect(),
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
}

/// Append-only conversation sent to the model on every iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcript seeded with one user text turn.
    pub fn seeded(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user_text(prompt)],
        }
    }

    /// Appends a turn. Turns without content are dropped.
    pub fn push(&mut self, turn: Turn) {
        if !turn.content.is_empty() {
            self.turns.push(turn);
        }
    }

    /// The turns in order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the transcript has no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Ids of tool requests that have no matching result yet.
    ///
    /// A transcript is only sendable to a model when this is empty.
    pub fn unresolved_tool_requests(&self) -> Vec<String> {
        let mut pending: Vec<String> = Vec::new();
        for block in self.turns.iter().flat_map(|t| t.content.iter()) {
            match block {
                ContentBlock::ToolUse { id, .. } => pending.push(id.clone()),
                ContentBlock::ToolResult { tool_use_id, .. } => {
                    pending.retain(|id| id != tool_use_id);
                }
                ContentBlock::Text { .. } => {}
            }
        }
        pending
    }
}
