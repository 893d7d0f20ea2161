//! Butler CLI entry point.

use anyhow::Result;
use butler::cli::commands::{dashboard, init, list, run, up};
use butler::cli::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Up { config, database_url } => up::execute(&config, &database_url).await,
        Commands::Run { butler, prompt, config_dir, database_url } => {
            run::execute(&butler, &prompt, &config_dir, &database_url, cli.json).await
        }
        Commands::List { config_dir } => list::execute(&config_dir, cli.json).await,
        Commands::Init { name, config_dir, force } => init::execute(&name, &config_dir, force, cli.json).await,
        Commands::Dashboard { host, port, database_url } => dashboard::execute(&host, port, &database_url).await,
    }
}
