use super::{http_client, send_json, LlmBackend};
use crate::config::ModelConfig;
use crate::llm::{NormalizedTurn, StopReason};
use async_trait::async_trait;
use marketlens_core::{ContentBlock, MarketlensError, MarketlensResult, Role, Transcript};
use marketlens_tools::ToolDescriptor;
use serde_json::json;

/// OpenAI chat completions backend.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
    name: String,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> MarketlensResult<Self> {
        let http = http_client(&config)?;
        let name = format!("openai:{}", config.model_id);
        Ok(Self { config, http, name })
    }

    fn build_tools(tools: &[ToolDescriptor]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect()
    }
}

/// Flattens the transcript into chat messages.
///
/// Assistant text and tool requests fold into one message with `tool_calls`; each tool
/// result becomes its own `tool` message keyed by `tool_call_id`.
fn build_messages(system_prompt: &str, transcript: &Transcript) -> Vec<serde_json::Value> {
    let mut api_messages = vec![json!({"role": "system", "content": system_prompt})];

    for turn in transcript.turns() {
        match turn.role {
            Role::Assistant => {
                let tool_calls: Vec<serde_json::Value> = turn
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::ToolUse { id, name, input } => Some(json!({
                            "id": id,
                            "type": "function",
                            "function": {"name": name, "arguments": input.to_string()},
                        })),
                        _ => None,
                    })
                    .collect();
                let text = turn.text();
                let content = if text.is_empty() {
                    serde_json::Value::Null
                } else {
                    json!(text)
                };
                let mut msg = json!({"role": "assistant", "content": content});
                if !tool_calls.is_empty() {
                    msg["tool_calls"] = json!(tool_calls);
                }
                api_messages.push(msg);
            }
            Role::User => {
                for block in &turn.content {
                    match block {
                        ContentBlock::Text { text } => {
                            api_messages.push(json!({"role": "user", "content": text}));
                        }
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => api_messages.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": content.to_string(),
                        })),
                        ContentBlock::ToolUse { .. } => {}
                    }
                }
            }
        }
    }

    api_messages
}

/// gpt-5 and the o-series take `max_completion_tokens` and reject a non-default temperature.
fn is_reasoning_model(model_id: &str) -> bool {
    let id = model_id.trim().to_ascii_lowercase();
    ["gpt-5", "o1", "o3", "o4"].iter().any(|p| id.starts_with(p))
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_turn(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> MarketlensResult<NormalizedTurn> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let mut body = json!({
            "model": self.config.model_id,
            "messages": build_messages(system_prompt, transcript),
        });
        if is_reasoning_model(&self.config.model_id) {
            body["max_completion_tokens"] = json!(self.config.max_tokens);
        } else {
            body["max_tokens"] = json!(self.config.max_tokens);
            body["temperature"] = json!(self.config.temperature);
        }

        if !tools.is_empty() {
            body["tools"] = json!(Self::build_tools(tools));
        }

        let request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        let resp_body = send_json("OpenAI", request).await?;
        let mut turn = parse_openai_response(&resp_body)?;
        turn.backend = self.name.clone();
        if turn.model.is_empty() {
            turn.model = self.config.model_id.clone();
        }
        Ok(turn)
    }
}

/// Normalizes a chat completions response body.
pub fn parse_openai_response(body: &serde_json::Value) -> MarketlensResult<NormalizedTurn> {
    let choice = body["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| {
            MarketlensError::MalformedResponse("no choices in OpenAI response".into())
        })?;
    let message = &choice["message"];

    let mut content = Vec::new();
    if let Some(text) = message["content"].as_str() {
        if !text.is_empty() {
            content.push(ContentBlock::text(text));
        }
    }

    if let Some(calls) = message["tool_calls"].as_array() {
        for tc in calls {
            let (Some(id), Some(name)) = (tc["id"].as_str(), tc["function"]["name"].as_str())
            else {
                return Err(MarketlensError::MalformedResponse(
                    "tool call without id or name".into(),
                ));
            };
            let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
            let input: serde_json::Value = if args_str.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(args_str).map_err(|e| {
                    MarketlensError::MalformedResponse(format!(
                        "arguments of tool call {id} are not JSON: {e}"
                    ))
                })?
            };
            content.push(ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            });
        }
    }

    let has_tool_use = content
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));
    let stop = if has_tool_use {
        StopReason::ToolUseRequested
    } else if choice["finish_reason"].as_str() == Some("length") {
        StopReason::Truncated
    } else {
        StopReason::EndOfTurn
    };

    let mut turn = NormalizedTurn::new(content, stop);
    turn.model = body["model"].as_str().unwrap_or_default().to_string();
    Ok(turn)
}
