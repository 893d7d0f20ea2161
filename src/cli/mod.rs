//! CLI interface module.
//!
//! A butler's own configuration directory holds one TOML file per butler
//! (file stem is the butler's name); `up` and `run` operate against a
//! single file, `list` and `dashboard` operate across a whole directory.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "butler")]
#[command(about = "Execution-control plane for a per-operator butler daemon", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the long-lived daemon for a single butler
    Up {
        /// Path to the butler's TOML configuration file
        #[arg(short, long, default_value = "butler.toml")]
        config: PathBuf,

        /// SQLite connection string for this butler's database
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite://butler.db")]
        database_url: String,
    },

    /// One-shot manual trigger of a butler
    Run {
        /// Butler name; resolves to `<config_dir>/<butler>.toml`
        butler: String,

        /// Prompt text handed to the spawned worker
        prompt: String,

        /// Directory holding one TOML file per butler
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,

        /// SQLite connection string for this butler's database
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite://butler.db")]
        database_url: String,
    },

    /// List configured butlers
    List {
        /// Directory holding one TOML file per butler
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,
    },

    /// Scaffold a new butler configuration file
    Init {
        /// Name of the new butler
        name: String,

        /// Directory to write the new configuration file into
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,

        /// Overwrite an existing configuration file for this butler
        #[arg(long)]
        force: bool,
    },

    /// Start the read-mostly dashboard API, aggregating across every
    /// butler database found under `DATABASE_URL`
    Dashboard {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 40200)]
        port: u16,

        /// Directory containing one SQLite database file per butler
        /// (file stem is the butler's name)
        #[arg(long, env = "DATABASE_URL", default_value = ".")]
        database_url: String,
    },
}
