//! Integration tests for the status HTTP surface
//!
//! Tests health checks, metrics, engine status and recent decisions.

use axum_test::TestServer;
use crossguard::core::http::{create_router, AppState};
use crossguard::core::orchestrator::{EngineStatus, SharedStatus};
use crossguard::metrics::Metrics;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::test_utils::{candles, golden_cross_prices, test_config, TestApiServer, TestEngine};

fn idle_server() -> TestApiServer {
    let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
    let status = Arc::new(RwLock::new(EngineStatus::new(0)));
    TestApiServer::new(metrics, status)
}

fn server_with_stall_window(
    metrics: Arc<Metrics>,
    status: SharedStatus,
    stall_after: Duration,
) -> TestServer {
    let state = AppState::new(metrics, status).with_stall_after(stall_after);
    TestServer::new(create_router(state)).expect("start test server")
}

#[tokio::test]
async fn health_is_starting_before_the_first_tick() {
    let app = idle_server();
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "starting");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert!(body["last_tick"].is_null());
    assert_eq!(body["service"], "crossguard-signal-engine");
}

#[tokio::test]
async fn health_is_healthy_after_a_live_tick() {
    let mut engine = TestEngine::new(&test_config(), &["BTCUSDT"]);
    engine.orchestrator.run_tick().await;
    let app = TestApiServer::new(engine.metrics.clone(), engine.orchestrator.status());

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["last_tick"], 1);
}

#[tokio::test]
async fn health_is_degraded_when_serving_cached_scans() {
    let mut engine = TestEngine::new(&test_config(), &["BTCUSDT"]);
    engine.market.snapshot_down.store(true, Ordering::SeqCst);
    engine.orchestrator.run_tick().await;
    let app = TestApiServer::new(engine.metrics.clone(), engine.orchestrator.status());

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn health_is_stalled_when_ticks_stop() {
    let mut engine = TestEngine::new(&test_config(), &["BTCUSDT"]);
    engine.orchestrator.run_tick().await;
    let server = server_with_stall_window(
        engine.metrics.clone(),
        engine.orchestrator.status(),
        Duration::from_millis(10),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["status"], "stalled");
    assert_eq!(body["last_tick"], 1);
}

#[tokio::test]
async fn health_is_stalled_when_no_tick_ever_completes() {
    let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
    let status = Arc::new(RwLock::new(EngineStatus::new(1)));
    let server = server_with_stall_window(metrics, status, Duration::from_millis(10));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["status"], "stalled");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = idle_server();
    app.server.get("/health").await;
    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    for name in [
        "http_requests_total",
        "http_request_duration_seconds",
        "http_requests_in_flight",
        "ticks_total",
        "scan_external_calls_total",
    ] {
        assert!(body.contains(name), "Expected {} metric", name);
    }
    assert!(app.metrics.http_requests_total.get() >= 1);
}

#[tokio::test]
async fn status_before_first_tick() {
    let app = idle_server();
    let response = app.server.get("/api/status").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["stage"], "idle");
    assert!(body["last_report"].is_null());
}

#[tokio::test]
async fn status_and_decisions_after_a_tick() {
    let mut engine = TestEngine::new(&test_config(), &["BTCUSDT", "ETHUSDT"]);
    engine
        .market
        .set_candles("BTCUSDT", candles(&golden_cross_prices()));
    engine.orchestrator.run_tick().await;

    let app = TestApiServer::new(engine.metrics.clone(), engine.orchestrator.status());

    let status: Value = app.server.get("/api/status").await.json();
    assert_eq!(status["universe"], 2);
    assert_eq!(status["last_report"]["tick"], 1);
    assert_eq!(status["last_report"]["orders_placed"], 1);

    let decisions: Value = app.server.get("/api/decisions").await.json();
    let decisions = decisions.as_array().unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0]["symbol"], "BTCUSDT");
    assert_eq!(decisions[0]["admitted"], true);

    let filtered: Value = app
        .server
        .get("/api/decisions")
        .add_query_param("admitted", "false")
        .await
        .json();
    assert!(filtered.as_array().unwrap().is_empty());

    let by_symbol: Value = app
        .server
        .get("/api/decisions")
        .add_query_param("symbol", "btcusdt")
        .await
        .json();
    assert_eq!(by_symbol.as_array().unwrap().len(), 1);

    let metrics = app.server.get("/metrics").await.text();
    assert!(metrics.contains("orders_placed_total 1"));
}
