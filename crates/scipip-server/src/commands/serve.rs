//! `scipip serve` -- run the HTTP API.
//!
//! ```text
//! scipip serve
//! scipip serve --host 127.0.0.1 --port 9000
//! ```

use anyhow::Context;
use clap::Args;
use scipip_core::{AppContext, ServiceConfig};
use tokio::net::TcpListener;
use tracing::info;

use scipip_server::{ApiState, build_router};

/// Arguments for the `scipip serve` subcommand.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (overrides `api.host`).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides `api.port`).
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub async fn run(args: ServeArgs, mut config: ServiceConfig) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let origins = config.api.allowed_origins.clone();
    let ctx = AppContext::new(config).context("failed to initialize pipeline backend")?;
    let app = build_router(ApiState::new(ctx), &origins);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "scipip API listening -- press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
