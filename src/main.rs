//! Agency client entry point.
//!
//! Loads configuration, initialises structured logging, installs the
//! shutdown coordinator and runs the batch loop over the agency's bets
//! file. A graceful shutdown exits with status 0 like a completed run.

use anyhow::{Context, Result};
use tracing::info;

use bet_client::config::ClientConfig;
use bet_client::engine::BatchLoop;
use bet_client::shutdown::{ShutdownCoordinator, ShutdownToken};
use bet_client::source::CsvRecordSource;
use bet_client::telemetry;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    telemetry::init_logging();

    let config_path =
        std::env::var("CLI_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = ClientConfig::load(&config_path)?;

    info!(
        action = "config",
        result = "success",
        client_id = %cfg.id,
        server_address = %cfg.server_address,
        loop_amount = cfg.loop_amount,
        loop_period_ms = cfg.loop_period_ms,
        max_batch_size = cfg.max_batch_size,
        mode = ?cfg.mode,
        "Client starting up"
    );

    // The coordinator must be listening before any connection is opened.
    let shutdown = ShutdownToken::new();
    let coordinator = ShutdownCoordinator::spawn(shutdown.clone());

    let bets_path = cfg.bets_path();
    let mut source = CsvRecordSource::open(&bets_path)
        .await
        .with_context(|| format!("Failed to open bets file {}", bets_path.display()))?;

    let mut batch_loop = BatchLoop::new(cfg, shutdown);
    let report = batch_loop.run(&mut source).await?;

    coordinator.abort();

    info!(
        outcome = %report.outcome,
        cycles = report.cycles,
        bets = report.bets_sent,
        winners = ?report.winners,
        "Client shut down cleanly."
    );

    Ok(())
}
