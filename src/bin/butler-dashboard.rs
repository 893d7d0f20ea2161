//! Standalone dashboard binary: the same read API as `butler dashboard`,
//! packaged separately so it can be deployed without the daemon's
//! subprocess-spawning privileges.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "butler-dashboard")]
#[command(about = "Read-mostly dashboard API for one or more butlers", long_about = None)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 40200)]
    port: u16,

    /// Directory containing one SQLite database file per butler
    #[arg(long, env = "DATABASE_URL", default_value = ".")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let args = Args::parse();
    butler::dashboard::serve(&args.host, args.port, &args.database_url).await
}
