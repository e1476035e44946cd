use super::{http_client, send_json, LlmBackend};
use crate::config::ModelConfig;
use crate::llm::{NormalizedTurn, StopReason};
use async_trait::async_trait;
use marketlens_core::{ContentBlock, MarketlensError, MarketlensResult, Role, Transcript};
use marketlens_tools::ToolDescriptor;
use serde::Serialize;
use serde_json::json;

/// Claude (Anthropic Messages API) backend.
pub struct ClaudeBackend {
    config: ModelConfig,
    http: reqwest::Client,
    name: String,
}

impl ClaudeBackend {
    pub fn new(config: ModelConfig) -> MarketlensResult<Self> {
        let http = http_client(&config)?;
        let name = format!("claude:{}", config.model_id);
        Ok(Self { config, http, name })
    }

    fn build_body(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> serde_json::Value {
        let mut body = json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system_prompt,
            "messages": encode_messages(transcript),
        });

        if !tools.is_empty() {
            let claude_tools: Vec<ClaudeTool<'_>> = tools
                .iter()
                .map(|t| ClaudeTool {
                    name: &t.name,
                    description: &t.description,
                    input_schema: &t.input_schema,
                })
                .collect();
            body["tools"] = json!(claude_tools);
        }

        body
    }
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_turn(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> MarketlensResult<NormalizedTurn> {
        let url = format!("{}/v1/messages", self.config.base_url());
        let body = self.build_body(system_prompt, transcript, tools);

        let request = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body);

        let resp_body = send_json("Claude", request).await?;
        let mut turn = parse_claude_response(&resp_body)?;
        turn.backend = self.name.clone();
        if turn.model.is_empty() {
            turn.model = self.config.model_id.clone();
        }
        Ok(turn)
    }
}

// -- Claude wire types --

#[derive(Serialize)]
struct ClaudeTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

fn encode_messages(transcript: &Transcript) -> Vec<serde_json::Value> {
    transcript
        .turns()
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let content: Vec<serde_json::Value> = turn
                .content
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => json!({"type": "text", "text": text}),
                    ContentBlock::ToolUse { id, name, input } => json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": input,
                    }),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => json!({
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": content.to_string(),
                        "is_error": is_error,
                    }),
                })
                .collect();
            json!({"role": role, "content": content})
        })
        .collect()
}

/// Normalizes a Messages API response body.
pub fn parse_claude_response(body: &serde_json::Value) -> MarketlensResult<NormalizedTurn> {
    let blocks = body["content"].as_array().ok_or_else(|| {
        MarketlensError::MalformedResponse("missing content in Claude response".into())
    })?;

    let mut content = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    content.push(ContentBlock::text(t));
                }
            }
            Some("tool_use") => {
                let (Some(id), Some(name)) = (block["id"].as_str(), block["name"].as_str()) else {
                    return Err(MarketlensError::MalformedResponse(
                        "tool_use block without id or name".into(),
                    ));
                };
                let input = match &block["input"] {
                    serde_json::Value::Null => json!({}),
                    other => other.clone(),
                };
                content.push(ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input,
                });
            }
            _ => {}
        }
    }

    let has_tool_use = content
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));
    let stop = match body["stop_reason"].as_str() {
        Some("max_tokens") => StopReason::Truncated,
        Some("tool_use") => StopReason::ToolUseRequested,
        _ if has_tool_use => StopReason::ToolUseRequested,
        _ => StopReason::EndOfTurn,
    };

    let mut turn = NormalizedTurn::new(content, stop);
    turn.model = body["model"].as_str().unwrap_or_default().to_string();
    Ok(turn)
}
