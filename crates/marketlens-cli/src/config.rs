use marketlens_agent::{GatewayConfig, ModelConfig, RetryPolicy, RunLimits};
use marketlens_tools::StockInfo;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_PRIMARY_MODEL: &str = "gpt-5-nano-2025-08-07";
const DEFAULT_FALLBACK_MODEL: &str = "claude-sonnet-4-20250514";

/// Contents of `marketlens.toml`. Every section is optional.
#[derive(Debug, Deserialize)]
pub struct MarketlensConfig {
    #[serde(default = "default_gateway")]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: RunLimits,
    #[serde(default)]
    pub server: ServerConfig,
    /// Directory of `<TICKER>.csv` price files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Root of the report store.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    /// `[stocks.<TICKER>]` tables with company name and sector.
    #[serde(default)]
    pub stocks: BTreeMap<String, StockInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for MarketlensConfig {
    fn default() -> Self {
        Self {
            gateway: default_gateway(),
            agent: RunLimits::default(),
            server: ServerConfig::default(),
            data_dir: default_data_dir(),
            reports_dir: default_reports_dir(),
            stocks: BTreeMap::new(),
        }
    }
}

fn default_gateway() -> GatewayConfig {
    GatewayConfig {
        primary: ModelConfig::new(DEFAULT_PRIMARY_MODEL, ""),
        fallback: Some(ModelConfig::new(DEFAULT_FALLBACK_MODEL, "")),
        retry_policy: RetryPolicy::default(),
    }
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("./data/reports")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

impl MarketlensConfig {
    /// Reads `path`, or falls back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(s) => toml::from_str(&s).map_err(|e| {
                anyhow::anyhow!("Failed to parse config file '{}': {e}", path.display())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file; using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file '{}': {e}",
                path.display()
            )),
        }
    }

    /// Applies environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(model) = lookup("MODEL_PRIMARY") {
            self.gateway.primary.model_id = model;
        }
        if let Some(model) = lookup("MODEL_FALLBACK") {
            match &mut self.gateway.fallback {
                Some(fallback) => fallback.model_id = model,
                None => self.gateway.fallback = Some(ModelConfig::new(model, "")),
            }
        }

        fill_api_key(&mut self.gateway.primary, &lookup);
        if let Some(fallback) = &mut self.gateway.fallback {
            fill_api_key(fallback, &lookup);
        }

        if let Some(v) = lookup("MAX_AGENT_ITERATIONS") {
            self.agent.max_iterations = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid MAX_AGENT_ITERATIONS '{v}': {e}"))?;
        }
        if let Some(v) = lookup("AGENT_TIMEOUT_SECONDS") {
            self.agent.timeout_secs = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid AGENT_TIMEOUT_SECONDS '{v}': {e}"))?;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("REPORTS_DIR") {
            self.reports_dir = PathBuf::from(dir);
        }
        Ok(())
    }
}

fn fill_api_key(model: &mut ModelConfig, lookup: &impl Fn(&str) -> Option<String>) {
    if model.api_key.is_empty() {
        if let Some(key) = lookup(model.provider().api_key_env()) {
            model.api_key = key;
        }
    }
}
