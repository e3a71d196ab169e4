//! Status HTTP endpoints using Axum

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::core::orchestrator::{EngineStatus, SharedStatus};
use crate::metrics::Metrics;

/// No completed tick for this long and the engine reports stalled.
const DEFAULT_STALL_AFTER: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub status: SharedStatus,
    pub start_time: Arc<Instant>,
    pub stall_after: Duration,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>, status: SharedStatus) -> Self {
        Self {
            metrics,
            status,
            start_time: Arc::new(Instant::now()),
            stall_after: DEFAULT_STALL_AFTER,
        }
    }

    pub fn with_stall_after(mut self, stall_after: Duration) -> Self {
        self.stall_after = stall_after;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Last tick completed recently with a live snapshot
    Healthy,
    /// Last tick completed recently but served cached scan results
    Degraded,
    /// No tick completed yet, still within the stall window
    Starting,
    /// No tick completed within the stall window
    Stalled,
}

impl HealthStatus {
    /// Judge the engine from its last tick report.
    pub fn evaluate(
        engine: &EngineStatus,
        uptime: Duration,
        stall_after: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        match &engine.last_report {
            None if uptime <= stall_after => HealthStatus::Starting,
            None => HealthStatus::Stalled,
            Some(report) => {
                let age = (now - report.started_at).to_std().unwrap_or(Duration::ZERO);
                if age > stall_after {
                    HealthStatus::Stalled
                } else if report.snapshot_fallback {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                }
            }
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Stalled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::OK,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Starting => "starting",
            HealthStatus::Stalled => "stalled",
        };
        f.write_str(name)
    }
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let engine = state.status.read().await;
    let uptime = state.start_time.elapsed();
    let now = Utc::now();
    let health = HealthStatus::evaluate(&engine, uptime, state.stall_after, now);
    let last_tick = engine.last_report.as_ref().map(|r| r.tick);
    let last_tick_age_seconds = engine
        .last_report
        .as_ref()
        .map(|r| (now - r.started_at).num_seconds().max(0));

    (
        health.status_code(),
        Json(json!({
            "status": health,
            "uptime_seconds": uptime.as_secs(),
            "last_tick": last_tick,
            "last_tick_age_seconds": last_tick_age_seconds,
            "service": "crossguard-signal-engine"
        })),
    )
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Current stage and the last tick's report
async fn engine_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.status.read().await;
    Json(json!({
        "stage": status.stage,
        "universe": status.universe,
        "last_report": status.last_report,
    }))
}

#[derive(Debug, Deserialize)]
struct DecisionQuery {
    symbol: Option<String>,
    admitted: Option<bool>,
    limit: Option<usize>,
}

/// Recent protection decisions, newest first
async fn recent_decisions(
    State(state): State<AppState>,
    Query(params): Query<DecisionQuery>,
) -> Json<Value> {
    let status = state.status.read().await;
    let symbol = params.symbol.map(|s| s.to_uppercase());
    let limit = params.limit.unwrap_or(50);

    let decisions: Vec<_> = status
        .recent_decisions
        .iter()
        .rev()
        .filter(|d| symbol.as_deref().map_or(true, |s| d.symbol == s))
        .filter(|d| params.admitted.map_or(true, |a| d.admitted == a))
        .take(limit)
        .collect();
    Json(json!(decisions))
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/status", get(engine_status))
        .route("/api/decisions", get(recent_decisions))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        port
    );
    axum::serve(listener, app).await
}
