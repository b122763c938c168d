//! `scipip generate` -- run one pipeline in-process.
//!
//! Prints the buffered JSON response, or with `--stream` each event frame
//! as it is produced.
//!
//! ```text
//! scipip generate "Graph neural networks for drug discovery"
//! scipip generate --stream "Graph neural networks for drug discovery"
//! ```

use std::io::Write;

use anyhow::Context;
use clap::Args;
use scipip_core::{AppContext, ServiceConfig, StreamEvent, generate_buffered, stream_pipeline};

/// Arguments for the `scipip generate` subcommand.
#[derive(Args)]
pub struct GenerateArgs {
    /// Research background to generate ideas for.
    pub background: String,

    /// Print `data:` event frames as the stages complete.
    #[arg(short, long)]
    pub stream: bool,
}

pub async fn run(args: GenerateArgs, config: ServiceConfig) -> anyhow::Result<()> {
    let ctx = AppContext::new(config).context("failed to initialize pipeline backend")?;
    let budget = ctx.request_budget();

    if !args.stream {
        let response = generate_buffered(ctx.orchestrator(), &args.background, budget).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let mut rx = stream_pipeline(ctx.orchestrator(), &args.background, budget)?;
    let mut stdout = std::io::stdout();
    let mut failed = None;
    while let Some(event) = rx.recv().await {
        stdout.write_all(event.to_frame()?.as_bytes())?;
        stdout.flush()?;
        if let StreamEvent::Error { message, .. } = event {
            failed = Some(message);
        }
    }
    match failed {
        Some(message) => anyhow::bail!(message),
        None => Ok(()),
    }
}
