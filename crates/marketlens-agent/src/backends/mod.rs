pub mod claude;
pub mod openai;

use crate::config::{LlmProvider, ModelConfig};
use crate::llm::NormalizedTurn;
use async_trait::async_trait;
use marketlens_core::{MarketlensError, MarketlensResult, Transcript};
use marketlens_tools::ToolDescriptor;

/// Trait for LLM vendor backends.
///
/// A backend only translates shapes: it encodes the transcript and tool schemas
/// into one vendor request and normalizes the answer. Retries and failover live in
/// [`crate::gateway::ProviderGateway`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short name used in logs, e.g. `claude:claude-sonnet-4-20250514`.
    fn name(&self) -> &str;

    /// Requests the next model turn.
    async fn next_turn(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> MarketlensResult<NormalizedTurn>;
}

/// Builds the backend matching the config's vendor.
pub fn build_backend(config: ModelConfig) -> MarketlensResult<Box<dyn LlmBackend>> {
    Ok(match config.provider() {
        LlmProvider::Claude => Box::new(claude::ClaudeBackend::new(config)?),
        LlmProvider::OpenAi => Box::new(openai::OpenAiBackend::new(config)?),
    })
}

fn http_client(config: &ModelConfig) -> MarketlensResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| MarketlensError::Config(format!("cannot build HTTP client: {e}")))
}

fn map_reqwest_error(e: reqwest::Error) -> MarketlensError {
    if e.is_timeout() {
        MarketlensError::Timeout(e.to_string())
    } else if let Some(status) = e.status() {
        MarketlensError::Http {
            status: status.as_u16(),
            message: e.to_string(),
        }
    } else if e.is_decode() {
        MarketlensError::MalformedResponse(e.to_string())
    } else {
        MarketlensError::Connection(e.to_string())
    }
}

/// Sends a request and returns the JSON body of a 2xx answer.
async fn send_json(
    vendor: &str,
    request: reqwest::RequestBuilder,
) -> MarketlensResult<serde_json::Value> {
    let resp = request.send().await.map_err(map_reqwest_error)?;
    let status = resp.status();
    let body = resp.text().await.map_err(map_reqwest_error)?;

    if !status.is_success() {
        return Err(MarketlensError::Http {
            status: status.as_u16(),
            message: format!("{vendor} API error: {body}"),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        MarketlensError::MalformedResponse(format!("{vendor} response is not JSON: {e}"))
    })
}
