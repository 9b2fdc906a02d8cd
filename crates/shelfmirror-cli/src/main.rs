//! ShelfMirror CLI - Command-line interface for shelfmirror
//!
//! Provides commands for:
//! - Running a mirror pass against the remote site
//! - Viewing and validating configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{config::ConfigCommand, sync::SyncCommand};

#[derive(Debug, Parser)]
#[command(
    name = "shelfmirror",
    version,
    about = "Incremental mirror of a SharePoint document store"
)]
pub struct Cli {
    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Mirror the remote store to the local filesystem
    Sync(SyncCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .as_deref()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(shelfmirror_core::config::Config::default_path);

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&config_path).await,
        Commands::Config(cmd) => cmd.execute(&config_path).await,
    }
}
