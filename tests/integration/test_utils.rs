//! Test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use crossguard::config::Config;
use crossguard::core::http::{create_router, AppState};
use crossguard::core::orchestrator::{CycleOrchestrator, SharedStatus};
use crossguard::error::{ExecutionError, MarketDataError};
use crossguard::metrics::Metrics;
use crossguard::models::market::{OrderResult, OrderSide, PricePoint, TickerSnapshot, Timeframe};
use crossguard::models::protection::EngineEvent;
use crossguard::scanner::TierTable;
use crossguard::services::events::EventSink;
use crossguard::services::execution::OrderExecutor;
use crossguard::services::market_data::MarketDataProvider;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn hour(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::hours(i)
}

pub fn candles(prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| PricePoint::new(hour(i as i64), p, 1_000.0))
        .collect()
}

/// 20 falling candles, then a jump: a golden cross on the last candle
/// for short/long windows of 3/6.
pub fn golden_cross_prices() -> Vec<f64> {
    let mut prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
    prices.push(120.0);
    prices
}

/// 20 rising candles, then a drop: a death cross on the last candle
/// for short/long windows of 3/6.
pub fn death_cross_prices() -> Vec<f64> {
    let mut prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    prices.push(60.0);
    prices
}

/// Small windows and fast timeouts; BTCUSDT and ETHUSDT are tier 1.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.tracker.short_window = 3;
    config.tracker.long_window = 6;
    config.scanner.tiers = TierTable::new(&["BTCUSDT".to_string(), "ETHUSDT".to_string()], &[]);
    config.scanner.detail_timeout = Duration::from_millis(200);
    config.scanner.snapshot_timeout = Duration::from_millis(200);
    config.orchestrator.loop_interval = Duration::from_millis(50);
    config.orchestrator.order_timeout = Duration::from_millis(200);
    config.orchestrator.order_notional = 60.0;
    config
}

/// In-memory market data whose candles can be replaced between ticks.
#[derive(Default)]
pub struct ScriptedMarketData {
    pub tickers: Mutex<HashMap<String, TickerSnapshot>>,
    pub candles: Mutex<HashMap<String, Vec<PricePoint>>>,
    pub snapshot_down: AtomicBool,
}

impl ScriptedMarketData {
    pub fn with_symbols(symbols: &[&str]) -> Arc<Self> {
        let data = Arc::new(Self::default());
        for symbol in symbols {
            data.tickers.lock().unwrap().insert(
                symbol.to_string(),
                TickerSnapshot {
                    price: 100.0,
                    change_pct: 0.5,
                    volume: 10_000.0,
                },
            );
        }
        data
    }

    pub fn set_candles(&self, symbol: &str, points: Vec<PricePoint>) {
        self.candles.lock().unwrap().insert(symbol.to_string(), points);
    }

    pub fn push_candle(&self, symbol: &str, price: f64) {
        let mut candles = self.candles.lock().unwrap();
        let series = candles.entry(symbol.to_string()).or_default();
        let next = series.len() as i64;
        series.push(PricePoint::new(hour(next), price, 1_000.0));
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedMarketData {
    async fn fetch_snapshot(
        &self,
        pairs: &[String],
    ) -> Result<HashMap<String, TickerSnapshot>, MarketDataError> {
        if self.snapshot_down.load(Ordering::SeqCst) {
            return Err(MarketDataError::Unavailable("exchange down".to_string()));
        }
        let tickers = self.tickers.lock().unwrap();
        Ok(pairs
            .iter()
            .filter_map(|p| tickers.get(p).map(|t| (p.clone(), *t)))
            .collect())
    }

    async fn fetch_detail(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        _limit: usize,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        Ok(self
            .candles
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }
}

/// Order executor that records what it was asked to place.
#[derive(Default)]
pub struct RecordingExecutor {
    pub orders: Mutex<Vec<(String, OrderSide, f64)>>,
    pub hang: AtomicBool,
}

impl RecordingExecutor {
    pub fn orders(&self) -> Vec<(String, OrderSide, f64)> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderExecutor for RecordingExecutor {
    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderResult, ExecutionError> {
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push((symbol.to_string(), side, quantity));
        Ok(OrderResult {
            order_id: format!("test-{}", orders.len()),
            symbol: symbol.to_string(),
            side,
            quantity,
            price: None,
            placed_at: Utc::now(),
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Orchestrator wired to in-memory collaborators.
pub struct TestEngine {
    pub orchestrator: CycleOrchestrator,
    pub market: Arc<ScriptedMarketData>,
    pub executor: Arc<RecordingExecutor>,
    pub sink: Arc<RecordingSink>,
    pub metrics: Arc<Metrics>,
}

impl TestEngine {
    pub fn new(config: &Config, universe: &[&str]) -> Self {
        let market = ScriptedMarketData::with_symbols(universe);
        let executor = Arc::new(RecordingExecutor::default());
        let sink = Arc::new(RecordingSink::default());
        let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
        let orchestrator = CycleOrchestrator::new(
            config,
            universe.iter().map(|s| s.to_string()).collect(),
            market.clone(),
            executor.clone(),
            sink.clone(),
            metrics.clone(),
        );
        Self {
            orchestrator,
            market,
            executor,
            sink,
            metrics,
        }
    }
}

/// Test helper for HTTP integration tests
pub struct TestApiServer {
    pub server: TestServer,
    pub metrics: Arc<Metrics>,
    pub status: SharedStatus,
}

impl TestApiServer {
    pub fn new(metrics: Arc<Metrics>, status: SharedStatus) -> Self {
        let app = create_router(AppState::new(metrics.clone(), status.clone()));
        let server = TestServer::new(app).expect("start test server");
        Self {
            server,
            metrics,
            status,
        }
    }
}
