// Grid Trading Bot - command line entry point

use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use binance_grid_bot::{Config, ConfigError, TradingError, TradingResult};

// Load command modules from cli directory
#[path = "../cli/run_commands.rs"]
mod run_commands;
#[path = "../cli/status_commands.rs"]
mod status_commands;

#[derive(Parser)]
#[command(name = "grid-bot")]
#[command(version)]
#[command(about = "Binance spot grid trading bot", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Validate and start the trading loop
    Run {
        /// Simulate fills against live prices
        #[arg(long)]
        paper: bool,

        /// Trade on the Binance spot testnet
        #[arg(long, conflicts_with = "paper")]
        testnet: bool,
    },

    /// Show wallet history and unrealized profit
    Status {
        /// Number of snapshots to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Run pre-flight validation only
    Check {
        #[arg(long)]
        paper: bool,

        #[arg(long, conflicts_with = "paper")]
        testnet: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config is read before logging so its level can seed the filter
    let loaded = match cli.command {
        Commands::Init => None,
        _ => Some(Config::from_file(&cli.config)),
    };
    let configured_level = loaded
        .as_ref()
        .and_then(|result| result.as_ref().ok())
        .map(|config| config.logging.level.clone());
    setup_logging(cli.verbose, configured_level.as_deref());

    info!("🚀 Grid Bot v{}", env!("CARGO_PKG_VERSION"));
    info!("📁 Config: {}", cli.config);

    let result = match (cli.command, loaded) {
        (Commands::Init, _) => init_config(&cli.config),
        (_, Some(Err(e))) => {
            report_config_error(&e);
            std::process::exit(1);
        }
        (Commands::Run { paper, testnet }, Some(Ok(config))) => {
            run_commands::run_bot(config, paper, testnet).await
        }
        (Commands::Check { paper, testnet }, Some(Ok(config))) => {
            run_commands::check(config, paper, testnet).await
        }
        (Commands::Status { limit }, Some(Ok(config))) => {
            status_commands::show_status(&config, limit)
        }
        (_, None) => Ok(()),
    };

    if let Err(e) = result {
        error!("❌ [{}] {}", e.category(), e.user_message());
        std::process::exit(1);
    }
}

/// RUST_LOG wins, then --verbose, then the configured level
fn setup_logging(verbose: bool, configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { configured.unwrap_or("info") };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn report_config_error(e: &ConfigError) {
    error!("❌ Configuration Error");
    error!("{}", e);

    if matches!(e, ConfigError::FileRead(_)) {
        error!("");
        error!("💡 Quick fix:");
        error!("   1. Run: grid-bot init");
        error!("   2. Edit config.toml (symbol, mode, key files)");
        error!("   3. Try again");
    }
}

fn init_config(config_path: &str) -> TradingResult<()> {
    info!("🔧 Initializing configuration...");

    if Path::new(config_path).exists() {
        warn!("⚠️  {} already exists, skipping", config_path);
        return Ok(());
    }

    let default_config = include_str!("../../config.toml.example");
    // Never write a template that would not load back
    toml::from_str::<Config>(default_config)
        .map_err(|e| TradingError::Config(format!("bundled template is invalid: {}", e)))?;
    std::fs::write(config_path, default_config)?;

    info!("📝 Created {}", config_path);
    info!("💡 Next steps:");
    info!("   1. Edit {} (symbol, grid, key files)", config_path);
    info!("   2. Run: grid-bot check --paper");
    info!("   3. Run: grid-bot run --paper");
    Ok(())
}
