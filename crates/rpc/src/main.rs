//! Basket CLI - Main entry point

use basket_kernel::ProtocolConfig;
use basket_rpc::commands;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "basket")]
#[command(about = "Basket - Leveraged basket ledger", long_about = None)]
struct Cli {
    /// Protocol config file (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue, lever, accrue fees, sync, delever and redeem against mocks
    Demo,

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Filter from RUST_LOG, warnings only by default
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ProtocolConfig::from_file(path)?,
        None => ProtocolConfig::default(),
    };

    match cli.command {
        Commands::Demo => commands::demo(config).await?,
        Commands::Config => commands::config(&config)?,
    }

    Ok(())
}
