//! `marketlens` command-line entry point.

mod config;

use clap::{Parser, Subcommand};
use config::MarketlensConfig;
use futures_util::StreamExt;
use marketlens_agent::{AgentRunner, ProviderGateway, RunLimits};
use marketlens_gateway::{AppState, GatewayServer};
use marketlens_store::FileReportStore;
use marketlens_tools::{
    register_market_tools, CsvMarketData, MarketAnalytics, StockCatalogue, ToolRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "marketlens", about = "MarketLens: AI research reports for PSX stocks")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "marketlens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one analysis and print its steps as JSON lines
    Analyze {
        /// PSX ticker symbol, e.g. OGDC
        ticker: String,
        #[arg(long)]
        max_iterations: Option<u32>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Inspect the tool catalogue
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
}

#[derive(Subcommand)]
enum ToolsAction {
    /// List the tools offered to the model
    List,
}

struct Services {
    runner: AgentRunner,
    store: Arc<FileReportStore>,
    analytics: Arc<dyn MarketAnalytics>,
}

fn tool_registry(analytics: Arc<dyn MarketAnalytics>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_market_tools(&mut registry, analytics);
    registry
}

async fn build_services(config: &MarketlensConfig) -> anyhow::Result<Services> {
    let gateway = ProviderGateway::from_config(&config.gateway)?;
    info!(
        primary = gateway.primary_name(),
        fallback = gateway.fallback_name().unwrap_or("none"),
        "Provider gateway ready"
    );

    let analytics: Arc<dyn MarketAnalytics> = Arc::new(CsvMarketData::new(&config.data_dir));
    let registry = tool_registry(analytics.clone());
    info!(count = registry.tool_count(), "Market tools registered");

    let store = Arc::new(FileReportStore::new(&config.reports_dir).await?);
    let runner = AgentRunner::new(
        Arc::new(gateway),
        Arc::new(registry),
        analytics.clone(),
        store.clone(),
    );

    Ok(Services {
        runner,
        store,
        analytics,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = MarketlensConfig::load(&cli.config).await?;
    config.apply_env(|key| std::env::var(key).ok())?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let services = build_services(&config).await?;
            let app = GatewayServer::build(AppState {
                runner: services.runner,
                store: services.store,
                analytics: services.analytics,
                catalogue: StockCatalogue::new(config.stocks.clone()),
                limits: config.agent,
            });

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("MarketLens listening on {addr}");
            axum::serve(listener, app).await?;
        }
        Commands::Analyze {
            ticker,
            max_iterations,
            timeout_secs,
        } => {
            let limits = RunLimits {
                max_iterations: max_iterations.unwrap_or(config.agent.max_iterations),
                timeout_secs: timeout_secs.unwrap_or(config.agent.timeout_secs),
            };
            let services = build_services(&config).await?;

            let mut steps = services.runner.run(&ticker, limits);
            let mut failure = None;
            while let Some(step) = steps.next().await {
                println!("{}", serde_json::to_string(&step)?);
                if let Some(code) = step.error_code() {
                    failure = Some(code);
                }
            }
            if let Some(code) = failure {
                anyhow::bail!("analysis of {ticker} failed: {code}");
            }
        }
        Commands::Tools { action } => match action {
            ToolsAction::List => {
                let analytics: Arc<dyn MarketAnalytics> =
                    Arc::new(CsvMarketData::new(&config.data_dir));
                let registry = tool_registry(analytics);
                println!("Registered tools:");
                for tool in registry.schemas() {
                    println!("  {} — {}", tool.name, tool.description);
                }
                println!("\nTotal: {} tool(s)", registry.tool_count());
            }
        },
    }

    Ok(())
}
