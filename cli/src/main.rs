//! CLI for timestrata
//!
//! Offline tools over a tier database:
//! - query: reconstruct historical series as JSON
//! - schema: show tiers and their persisted columns
//! - ingest: replay a JSON-lines snapshot file into the tiers
//! - rebuild: recompute every tier from the finest tier's rows

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "timestrata")]
#[command(about = "timestrata - multi-tier time-series retention", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true, env = "TIMESTRATA_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct historical series across all tiers
    Query(commands::query::QueryArgs),

    /// Show configured tiers and their table columns
    Schema(commands::schema::SchemaArgs),

    /// Replay a JSON-lines file of timestamped snapshots
    Ingest(commands::ingest::IngestArgs),

    /// Clear all tiers and rebuild them from one source tier
    Rebuild(commands::rebuild::RebuildArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config;
    // Engine calls block on storage.
    let result = tokio::task::spawn_blocking(move || match cli.command {
        Commands::Query(args) => commands::query::run(config.as_deref(), args),
        Commands::Schema(args) => commands::schema::run(config.as_deref(), args),
        Commands::Ingest(args) => commands::ingest::run(config.as_deref(), args),
        Commands::Rebuild(args) => commands::rebuild::run(config.as_deref(), args),
    })
    .await?;

    if let Err(e) = result {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
