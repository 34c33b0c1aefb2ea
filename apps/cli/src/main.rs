//! Signal Intel CLI: run one aggregation and print the profile as JSON.
//!
//! Commands:
//! - `aggregate` - fetch, resolve and score metrics for one company
//! - `health` - show remaining quota per configured provider
//!
//! Provider credentials and limits come from `SIGNAL_INTEL_*` environment
//! variables (a `.env` file is loaded first) or from a JSON file via `--config`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_intel_core::{Aggregator, CompanyKey, IntelConfig, Metric, MetricSet, ProviderKind};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "signal-intel",
    about = "Aggregate company intelligence from filings, quotes, news, funding and code activity"
)]
struct Cli {
    /// JSON configuration file. Environment variables are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate metrics for one company.
    Aggregate {
        /// Ticker symbol (e.g., AAPL).
        ticker: String,

        /// Legal name, used by news, funding and code-activity providers.
        #[arg(long)]
        name: Option<String>,

        /// SEC Central Index Key. Looked up from the ticker when omitted.
        #[arg(long)]
        cik: Option<String>,

        /// Comma-separated metrics (e.g., revenue,market_cap). Defaults to all.
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<Metric>,

        /// Deadline for the whole call in milliseconds.
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Show rate-limit health of configured providers.
    Health {
        /// Single provider id (e.g., FINNHUB).
        #[arg(long)]
        provider: Option<ProviderKind>,
    },
}

fn init_tracing() {
    let log_format =
        std::env::var("SIGNAL_INTEL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays pure JSON.
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<IntelConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            Ok(IntelConfig::from_json(&json)?)
        }
        None => Ok(IntelConfig::from_env()?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_ref())?;
    let aggregator = Aggregator::from_config(&config);

    match cli.command {
        Commands::Aggregate {
            ticker,
            name,
            cik,
            metrics,
            deadline_ms,
        } => {
            let mut company = CompanyKey::new(&ticker)?;
            if let Some(name) = name {
                company = company.with_name(&name);
            }
            if let Some(cik) = cik {
                company = company.with_cik(&cik)?;
            }

            let metrics: MetricSet = if metrics.is_empty() {
                Metric::ALL.into_iter().collect()
            } else {
                metrics.into_iter().collect()
            };

            tracing::info!(
                "Aggregating {} metric(s) for {} across {:?}",
                metrics.len(),
                company,
                aggregator.providers()
            );
            let profile = aggregator
                .aggregate(&company, &metrics, deadline_ms.map(Duration::from_millis))
                .await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Health { provider } => {
            let health = match provider {
                Some(provider) => vec![aggregator.health(provider)?],
                None => aggregator.health_all(),
            };
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}
