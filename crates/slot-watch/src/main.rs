use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slot_watch::shutdown::{run_until_stopped, wait_for_signal};
use slot_watch::{
    Config, PollDriver, Reconciler, ReservationClient, ShutdownHandler, SlotTable, StopReason,
    TelegramSink,
};

#[derive(Parser)]
#[command(name = "slot-watch")]
#[command(about = "Alerts a Telegram chat while appointment slots are open")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml", env = "SLOT_WATCH_CONFIG")]
    config: PathBuf,

    /// Print an example configuration and exit
    #[arg(long)]
    example_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slot_watch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.example_config {
        print!("{}", toml::to_string(&Config::example())?);
        return Ok(());
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    tracing::info!("Starting slot watcher for region {}", config.region_code);

    let client =
        Arc::new(ReservationClient::new(&config).context("Failed to build reservation client")?);
    let sink =
        Arc::new(TelegramSink::new(&config.telegram).context("Failed to build Telegram client")?);
    let table = SlotTable::new();

    let reconciler = Reconciler::new(table.clone(), sink.clone(), config.booking_url.clone());
    let driver = PollDriver::new(client, reconciler, config.polling.clone());
    let poll_task = tokio::spawn(async move { driver.run().await });

    let handler = ShutdownHandler::new(table, sink);
    let (reason, deleted) = run_until_stopped(&handler, poll_task, wait_for_signal()).await;
    tracing::info!("Deleted {} messages, exiting", deleted);

    match reason {
        StopReason::Signal(_) => Ok(()),
        StopReason::SignalFailed(e) => Err(e).context("Failed to wait for a shutdown signal"),
        StopReason::PollerExited(Some(e)) => Err(e).context("Poll task died"),
        StopReason::PollerExited(None) => anyhow::bail!("Poll task exited unexpectedly"),
    }
}
