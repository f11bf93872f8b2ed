//! `yard` -- CLI binary for the switchyard chat gateway.
//!
//! Provides the following subcommands:
//!
//! - `yard gateway` -- Start every enabled channel and dispatch replies.
//! - `yard channels` -- Inspect channel configuration status.

use clap::{Parser, Subcommand};

mod commands;

/// switchyard chat gateway CLI.
#[derive(Parser)]
#[command(name = "yard", about = "switchyard chat gateway CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Start the gateway (channels + outbound dispatch).
    Gateway(commands::gateway::GatewayArgs),

    /// Inspect channel configuration.
    Channels {
        #[command(subcommand)]
        action: ChannelsAction,
    },
}

/// Subcommands for `yard channels`.
#[derive(Subcommand)]
enum ChannelsAction {
    /// Show channel status table.
    Status {
        /// Config file path (overrides auto-discovery).
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Gateway(args) => commands::gateway::run(args).await?,
        Commands::Channels { action } => match action {
            ChannelsAction::Status { config } => {
                let cfg = commands::load_config(config.as_deref()).await?;
                commands::channels::channels_status(&cfg);
            }
        },
    }

    Ok(())
}
