//! `scipip` -- CLI binary for the scientific idea generation service.
//!
//! Provides the following subcommands:
//!
//! - `scipip serve` -- Serve the HTTP API (buffered and streaming).
//! - `scipip generate` -- Run the pipeline once and print the result.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// Scientific idea generation service.
#[derive(Parser)]
#[command(name = "scipip", about = "Scientific idea generation service", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (defaults to $SCIPIP_CONFIG, then built-in defaults).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API until Ctrl+C.
    Serve(commands::serve::ServeArgs),

    /// Generate ideas for one research background.
    Generate(commands::generate::GenerateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    let default_filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_filter().to_string()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args, config).await?,
        Commands::Generate(args) => commands::generate::run(args, config).await?,
    }
    Ok(())
}
