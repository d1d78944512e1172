use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pocketbook", about = "Import bank exports and backups into a pocketbook ledger.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a CSV/JSON export through the import pipeline and write the batch as JSON.
    Import(commands::ImportArgs),
    /// Print the suggested column mapping for a file without importing it.
    Classify {
        /// Path to a CSV or JSON file
        file: PathBuf,
        /// Import rules (TOML). Defaults to the user config directory.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the batch JSON, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => commands::import(args).await,
        Commands::Classify { file, config } => commands::classify(&file, config.as_deref()).await,
    }
}
