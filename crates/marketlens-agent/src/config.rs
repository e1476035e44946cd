use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The vendor API a model is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Claude,
    OpenAi,
}

impl LlmProvider {
    /// Static vendor rule: `gpt-*` and the `o1`/`o3`/`o4` families go to OpenAI,
    /// everything else to Anthropic.
    pub fn from_model_id(model_id: &str) -> Self {
        let id = model_id.trim().to_ascii_lowercase();
        if ["gpt-", "o1", "o3", "o4"].iter().any(|p| id.starts_with(p)) {
            LlmProvider::OpenAi
        } else {
            LlmProvider::Claude
        }
    }

    /// Environment variable holding the API key when none is configured.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::Claude => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Explicit vendor; derived from `model_id` when absent.
    #[serde(default)]
    pub provider: Option<LlmProvider>,
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout; vendor default when absent.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    pub fn new(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider: None,
            model_id: model_id.into(),
            api_key: api_key.into(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: None,
        }
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
            .unwrap_or_else(|| LlmProvider::from_model_id(&self.model_id))
    }

    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider() {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        let secs = self.request_timeout_secs.unwrap_or(match self.provider() {
            LlmProvider::Claude => 10,
            LlmProvider::OpenAi => 15,
        });
        Duration::from_secs(secs)
    }
}

/// Retry behaviour of the gateway's primary backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts on the primary after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default)]
    pub backoff_base_ms: u64,
    /// Cap on the backoff delay in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_max_retries() -> u32 {
    1
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: 0,
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for `attempt` (0-based), capped at `backoff_max_ms`.
    pub fn compute_backoff(&self, attempt: u32) -> u64 {
        let delay = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        delay.min(self.backoff_max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub primary: ModelConfig,
    #[serde(default)]
    pub fallback: Option<ModelConfig>,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

/// Budget of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLimits {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    15
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RunLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn vendor_rule_by_model_name() {
        assert_eq!(LlmProvider::from_model_id("gpt-4o-mini"), LlmProvider::OpenAi);
        assert_eq!(LlmProvider::from_model_id("o3-mini"), LlmProvider::OpenAi);
        assert_eq!(
            LlmProvider::from_model_id("claude-sonnet-4-20250514"),
            LlmProvider::Claude
        );
        assert_eq!(LlmProvider::from_model_id("mistral-large"), LlmProvider::Claude);
    }

    #[test]
    fn explicit_provider_wins() {
        let mut config = ModelConfig::new("gpt-4o", "k");
        config.provider = Some(LlmProvider::Claude);
        assert_eq!(config.provider(), LlmProvider::Claude);
        assert_eq!(config.base_url(), "https://api.anthropic.com");
    }

    #[test]
    fn vendor_timeouts_and_defaults() {
        let claude = ModelConfig::new("claude-3-5-haiku-latest", "k");
        assert_eq!(claude.request_timeout(), Duration::from_secs(10));
        assert_eq!(claude.temperature, 0.3);
        assert_eq!(claude.max_tokens, 4096);

        let mut openai = ModelConfig::new("gpt-4o", "k");
        assert_eq!(openai.request_timeout(), Duration::from_secs(15));
        openai.request_timeout_secs = Some(3);
        assert_eq!(openai.request_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let mut config = ModelConfig::new("gpt-4o", "k");
        config.api_base_url = Some("http://127.0.0.1:9000/".into());
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn gateway_config_from_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [primary]
            model_id = "gpt-4o-mini"

            [fallback]
            model_id = "claude-sonnet-4-20250514"
            temperature = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.primary.provider(), LlmProvider::OpenAi);
        assert_eq!(config.fallback.as_ref().unwrap().temperature, 0.1);
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert_eq!(config.retry_policy.max_retries, 1);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_base_ms: 100,
            backoff_max_ms: 1_000,
        };
        assert_eq!(policy.compute_backoff(0), 100);
        assert_eq!(policy.compute_backoff(2), 400);
        assert_eq!(policy.compute_backoff(10), 1_000);
        assert_eq!(RetryPolicy::default().compute_backoff(3), 0);
    }

    #[test]
    fn run_limits_defaults() {
        let limits: RunLimits = serde_json::from_str("{}").unwrap();
        assert_eq!(limits, RunLimits::default());
        assert_eq!(limits.max_iterations, 15);
        assert_eq!(limits.timeout(), Duration::from_secs(120));
    }
}
