use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod collaborators;
mod commands;
mod config;

#[derive(Parser)]
#[command(name = "tasklink", about = "Task synchronization with a remote coding agent")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded remote agent frames through a sync service
    Replay(commands::replay::ReplayArgs),
    /// Show the agent catalog
    Agents(commands::agents::AgentsArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay(args) => commands::replay::run(args).await,
        Commands::Agents(args) => commands::agents::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
