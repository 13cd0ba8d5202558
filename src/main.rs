use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use configuration::{Config, LoggingSettings};
use core_types::{AccountId, Asset};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod simulate;
mod ui;

/// The main entry point for the Basket index fund simulator.
#[tokio::main]
async fn main() -> Result<()> {
    // Load RUST_LOG and BASKET__* overrides from a .env file, if there is one.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();
    let config = load(&cli.config)?;
    let _guard = init_logging(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Simulate(args) => simulate::run(&config, args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Multi-asset index fund engine: create baskets, buy, rebalance and redeem
/// against a simulated swap venue.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the validated configuration as JSON.
    ShowConfig,
    /// Create a fund and run deposits, an optional rebalance and a redemption.
    Simulate(SimulateArgs),
}

#[derive(Parser)]
pub struct SimulateArgs {
    /// The account that creates the fund and pays the creation fee.
    #[arg(long)]
    pub creator: AccountId,

    /// The account that deposits and redeems. Defaults to the creator.
    #[arg(long)]
    pub depositor: Option<AccountId>,

    #[arg(long, default_value = "Simulated Basket")]
    pub name: String,

    #[arg(long, default_value = "BSKT")]
    pub ticker: String,

    /// Basket assets (e.g. "WETH,WBTC").
    #[arg(long, value_delimiter = ',', required = true)]
    pub assets: Vec<Asset>,

    /// Target weights in percent, one per asset (e.g. "60,40").
    #[arg(long, value_delimiter = ',', required = true)]
    pub weights: Vec<u8>,

    /// Base-asset amount to deposit. Repeat for several deposits.
    #[arg(long = "deposit", value_delimiter = ',')]
    pub deposits: Vec<u64>,

    /// New target weights to set before rebalancing (e.g. "WETH:40,WBTC:60").
    #[arg(long, value_delimiter = ',', value_parser = parse_weight)]
    pub rebalance: Vec<(Asset, u8)>,

    /// Percentage of the depositor's shares to redeem at the end.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub redeem_percent: Option<u8>,

    /// Print the outcome as JSON instead of tables.
    #[arg(long)]
    pub json: bool,
}

/// Parses one `ASSET:WEIGHT` pair.
fn parse_weight(s: &str) -> Result<(Asset, u8), String> {
    let (asset, weight) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ASSET:WEIGHT, got '{s}'"))?;
    let asset = asset.trim().parse::<Asset>().map_err(|e| e.to_string())?;
    let weight = weight
        .trim()
        .parse::<u8>()
        .map_err(|e| format!("invalid weight in '{s}': {e}"))?;
    Ok((asset, weight))
}

// ==============================================================================
// Startup
// ==============================================================================

fn load(path: &PathBuf) -> Result<Config> {
    configuration::load_config_from(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Installs the global subscriber: stderr always, plus a daily rolling file
/// when `logging.directory` is set. The returned guard flushes the file sink
/// on drop and must live for the rest of `main`.
fn init_logging(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;
    Ok(guard)
}
