//! Crossguard Worker
//!
//! Runs the tick loop against Binance market data, paper-executes admitted
//! signals and serves status/metrics over HTTP.

use crossguard::config::Config;
use crossguard::core::{start_server, AppState, CycleOrchestrator};
use crossguard::logging;
use crossguard::Error;
use crossguard::metrics::Metrics;
use crossguard::services::binance::BinanceMarketData;
use crossguard::services::events::{EventSink, FanoutEventSink, JsonlEventSink, TracingEventSink};
use crossguard::services::execution::PaperOrderExecutor;
use crossguard::state::JsonFileStateStore;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> crossguard::Result<()> {
    // Load environment variables from .env if present
    dotenv().ok();

    // Initialize logging based on environment
    logging::init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    info!("Starting Crossguard Worker");
    info!(environment = %config.environment, "Environment");
    info!(
        short_window = config.tracker.short_window,
        long_window = config.tracker.long_window,
        timeframe = %config.scanner.timeframe,
        lookback = config.classifier.lookback_periods,
        interval_secs = config.orchestrator.loop_interval.as_secs(),
        "Engine configuration"
    );

    let metrics = Arc::new(Metrics::new()?);
    let market_data = Arc::new(BinanceMarketData::new(config.binance_api_url.clone()));

    let universe = match &config.pairs {
        Some(pairs) => pairs.clone(),
        None => {
            info!(quote_asset = %config.quote_asset, "Discovering trading universe");
            market_data.discover_universe(&config.quote_asset).await?
        }
    };
    if universe.is_empty() {
        return Err(Error::EmptyUniverse);
    }
    info!(pairs = universe.len(), "Trading universe loaded");

    // Event sinks: always log, optionally append to a JSONL file
    let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(TracingEventSink)];
    let mut event_writer = None;
    if let Some(path) = &config.event_log_path {
        let (sink, handle) = JsonlEventSink::spawn(path.clone());
        sinks.push(Arc::new(sink));
        event_writer = Some(handle);
    }
    let sink: Arc<dyn EventSink> = Arc::new(FanoutEventSink::new(sinks));

    let executor = Arc::new(PaperOrderExecutor::new());
    let store = JsonFileStateStore::new(config.state_path.clone());

    let mut orchestrator = CycleOrchestrator::new(
        &config,
        universe,
        market_data,
        executor,
        sink,
        metrics.clone(),
    );
    if let Err(e) = orchestrator.load_state(&store).await {
        warn!(error = %e, path = %store.path().display(), "Failed to load persisted state, starting cold");
        // Keep the unreadable file; refuse to start if it cannot be moved.
        store.quarantine().await?;
    }

    // Three missed ticks in a row and /health reports the engine stalled
    let app_state = AppState::new(metrics, orchestrator.status())
        .with_stall_after(config.orchestrator.loop_interval * 3);
    let port = config.port;
    let server = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, port).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received, finishing current tick");
        let _ = shutdown_tx.send(true);
    });

    orchestrator.run(shutdown_rx).await;

    if let Err(e) = orchestrator.save_state(&store).await {
        error!(error = %e, path = %store.path().display(), "Failed to save state");
    }

    // Dropping the orchestrator closes the event channel; let the writer drain.
    drop(orchestrator);
    if let Some(handle) = event_writer {
        let _ = handle.await;
    }
    server.abort();

    info!("Worker stopped");
    Ok(())
}
