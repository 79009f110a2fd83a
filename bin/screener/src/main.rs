use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, DataSource, MarketDataClient};
use engine::{Scheduler, ScreenFileConfig, Screener, YahooClient};
use replay::ReplayClient;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let screen_file = ScreenFileConfig::load(&cfg.screen_config_path);
    info!(
        source = %cfg.data_source,
        tickers = screen_file.universe.len(),
        "Screener starting"
    );

    // ── Market data client (injected based on DATA_SOURCE) ────────────────────
    let client: Arc<dyn MarketDataClient> = match cfg.data_source {
        DataSource::Yahoo => {
            let timeout = Duration::from_secs(screen_file.engine.fetch_timeout_secs);
            Arc::new(YahooClient::new(timeout))
        }
        DataSource::Replay => {
            let dir = cfg.replay_dir.as_deref().unwrap_or_default();
            let replay = ReplayClient::from_dir(dir)
                .unwrap_or_else(|e| panic!("Failed to load replay fixtures from '{dir}': {e}"));
            let known = replay.tickers().await;
            let missing: Vec<&String> = screen_file
                .universe
                .iter()
                .filter(|t| !known.contains(*t))
                .collect();
            if !missing.is_empty() {
                warn!(?missing, "Universe tickers without a replay fixture will be dropped");
            }
            Arc::new(replay)
        }
    };

    // ── Screener + scheduler ──────────────────────────────────────────────────
    let screener = Screener::new(client.clone(), screen_file.engine.screener_config());
    let (scheduler, handle) = Scheduler::new(
        screener,
        screen_file.universe.clone(),
        screen_file.engine.refresh_interval(),
    );
    let scheduler = scheduler.run_on_startup(screen_file.engine.run_on_startup);

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        screener: handle,
        client,
        universe: Arc::new(screen_file.universe),
        data_source: cfg.data_source,
    };
    let port = cfg.dashboard_port;

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    tokio::spawn(scheduler.run());
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Dashboard API stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    info!("Shutdown signal received. Exiting.");
}
