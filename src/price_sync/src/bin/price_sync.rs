use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use price_sync::{
    config::{load_config_path, load_config_str},
    orchestrator::{HistoricalSync, Orchestrator},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Crypto price landing collector")]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Backfill history, then collect real-time prices until Ctrl-C.
    Run,
    /// Backfill history only.
    Backfill,
    /// Store yesterday's intraday prices.
    Daily,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_path(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => load_config_str("")?,
    };

    match cli.cmd {
        Cmd::Run => {
            let mut orchestrator = Orchestrator::from_config(&config)?;
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("interrupt received, stopping after the current tick");
                        on_signal.cancel();
                    }
                    Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl-C"),
                }
            });

            let summary = orchestrator.run(cancel).await;
            tracing::info!(
                ticks = summary.collector.ticks,
                samples = summary.collector.samples_written,
                "collection stopped by user"
            );
        }
        Cmd::Backfill => {
            let results = HistoricalSync::from_config(&config)?.backfill().await;
            let failed = results.values().filter(|r| r.is_failed()).count();
            if failed > 0 {
                bail!("historical backfill failed for {failed} of {} assets", results.len());
            }
        }
        Cmd::Daily => {
            let results = Orchestrator::from_config(&config)?
                .snapshot_previous_day()
                .await;
            let failed = results.values().filter(|r| r.is_failed()).count();
            if failed > 0 {
                bail!("daily snapshot failed for {failed} of {} assets", results.len());
            }
        }
    }

    Ok(())
}
