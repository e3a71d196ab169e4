//! Tick orchestration
//!
//! One tick walks scanner, tracker, classifier, gate and executor in that
//! order and always ends back in [`TickStage::Idle`]. Per-symbol failures
//! drop that symbol from the remaining stages and never abort the tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{Config, OrchestratorConfig};
use crate::error::{ExecutionError, StateError};
use crate::metrics::Metrics;
use crate::models::market::{OrderSide, Timeframe};
use crate::models::protection::{EngineEvent, ProtectionDecision};
use crate::models::signal::{Action, Signal};
use crate::protection::ProtectionGate;
use crate::scanner::OpportunityScanner;
use crate::services::events::EventSink;
use crate::services::execution::OrderExecutor;
use crate::services::market_data::MarketDataProvider;
use crate::signals::{DeathCrossMark, SignalClassifier};
use crate::state::{EngineState, StateStore};

/// Protection decisions kept for the status view.
const RECENT_DECISIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStage {
    Idle,
    Scanning,
    Updating,
    Classifying,
    Gating,
    Dispatched,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TickStage::Idle => "idle",
            TickStage::Scanning => "scanning",
            TickStage::Updating => "updating",
            TickStage::Classifying => "classifying",
            TickStage::Gating => "gating",
            TickStage::Dispatched => "dispatched",
        };
        f.write_str(name)
    }
}

/// Summary of one completed tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub started_at: DateTime<Utc>,
    pub scanned: usize,
    pub stale: usize,
    pub candidates: usize,
    pub external_calls: usize,
    pub snapshot_fallback: bool,
    /// Symbols whose EMA state advanced this tick
    pub updated: usize,
    pub integrity_errors: usize,
    pub buys: usize,
    pub sells: usize,
    pub holds: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub orders_placed: usize,
    pub orders_failed: usize,
    pub elapsed_ms: u64,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            started_at: Utc::now(),
            scanned: 0,
            stale: 0,
            candidates: 0,
            external_calls: 0,
            snapshot_fallback: false,
            updated: 0,
            integrity_errors: 0,
            buys: 0,
            sells: 0,
            holds: 0,
            admitted: 0,
            rejected: 0,
            orders_placed: 0,
            orders_failed: 0,
            elapsed_ms: 0,
        }
    }

    pub fn signals(&self) -> usize {
        self.buys + self.sells + self.holds
    }
}

/// What the HTTP status surface reads.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub stage: TickStage,
    pub universe: usize,
    pub last_report: Option<TickReport>,
    /// Newest last
    pub recent_decisions: VecDeque<ProtectionDecision>,
}

impl EngineStatus {
    pub fn new(universe: usize) -> Self {
        Self {
            stage: TickStage::Idle,
            universe,
            last_report: None,
            recent_decisions: VecDeque::new(),
        }
    }

    fn push_decision(&mut self, decision: ProtectionDecision) {
        self.recent_decisions.push_back(decision);
        while self.recent_decisions.len() > RECENT_DECISIONS {
            self.recent_decisions.pop_front();
        }
    }
}

pub type SharedStatus = Arc<RwLock<EngineStatus>>;

/// Admitted signal waiting for dispatch.
struct PendingOrder {
    symbol: String,
    side: OrderSide,
    price: f64,
}

pub struct CycleOrchestrator {
    config: OrchestratorConfig,
    timeframe: Timeframe,
    universe: Vec<String>,
    scanner: OpportunityScanner,
    classifier: SignalClassifier,
    gate: ProtectionGate,
    executor: Arc<dyn OrderExecutor>,
    sink: Arc<dyn EventSink>,
    metrics: Arc<Metrics>,
    state: EngineState,
    status: SharedStatus,
}

impl CycleOrchestrator {
    pub fn new(
        config: &Config,
        universe: Vec<String>,
        provider: Arc<dyn MarketDataProvider>,
        executor: Arc<dyn OrderExecutor>,
        sink: Arc<dyn EventSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let status = Arc::new(RwLock::new(EngineStatus::new(universe.len())));
        Self {
            config: config.orchestrator.clone(),
            timeframe: config.scanner.timeframe,
            universe,
            scanner: OpportunityScanner::new(provider, config.scanner.clone()),
            classifier: SignalClassifier::new(config.classifier.clone()),
            gate: ProtectionGate::new(sink.clone()),
            executor,
            sink,
            metrics,
            state: EngineState::new(config),
            status,
        }
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    /// Restore persisted state, if the store has any. Returns whether it did.
    pub async fn load_state(&mut self, store: &dyn StateStore) -> Result<bool, StateError> {
        match store.load().await? {
            Some(persisted) => {
                self.state.restore(persisted);
                Ok(true)
            }
            None => {
                info!("CycleOrchestrator: no persisted state, starting cold");
                Ok(false)
            }
        }
    }

    pub async fn save_state(&self, store: &dyn StateStore) -> Result<(), StateError> {
        store.save(&self.state.to_persisted()).await?;
        info!(tick = self.state.tick, "CycleOrchestrator: state saved");
        Ok(())
    }

    /// Drive ticks at the configured interval until `shutdown` turns true.
    ///
    /// Shutdown is only observed between ticks, so a running tick always
    /// finishes gating and dispatch.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.loop_interval;
        info!(
            interval_secs = interval.as_secs_f64(),
            universe = self.universe.len(),
            "CycleOrchestrator: starting tick loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            let report = self.run_tick().await;
            let elapsed = started.elapsed();

            let wait = match interval.checked_sub(elapsed) {
                Some(wait) => wait,
                None => {
                    warn!(
                        tick = report.tick,
                        elapsed_ms = elapsed.as_millis() as u64,
                        interval_ms = interval.as_millis() as u64,
                        "CycleOrchestrator: tick overran interval, starting next tick now"
                    );
                    self.metrics.tick_overruns_total.inc();
                    Duration::ZERO
                }
            };

            let stop = tokio::select! {
                _ = tokio::time::sleep(wait) => false,
                _ = shutdown.wait_for(|stop| *stop) => true,
            };
            if stop {
                break;
            }
        }

        info!(tick = self.state.tick, "CycleOrchestrator: tick loop stopped");
    }

    /// Run one full tick and return its report.
    pub async fn run_tick(&mut self) -> TickReport {
        let started = Instant::now();
        let tick = self.state.tick + 1;
        let mut report = TickReport::new(tick);

        // Scanning
        self.set_stage(TickStage::Scanning).await;
        let scan = self
            .scanner
            .scan(&self.universe, &mut self.state.scanner_cache)
            .await;
        report.scanned = scan.results.len();
        report.stale = scan.stale_count();
        report.candidates = scan.candidates;
        report.external_calls = scan.external_calls;
        report.snapshot_fallback = scan.snapshot_fallback;

        // Updating
        self.set_stage(TickStage::Updating).await;
        let mut updated: Vec<(String, f64)> = Vec::new();
        for result in scan.fresh() {
            let Some(points) = scan.history.get(&result.symbol) else {
                continue;
            };
            let outcome = self
                .state
                .tracker
                .update_batch(&result.symbol, self.timeframe, points);
            report.integrity_errors += outcome.rejected.len();

            // Every death cross in the batch lands in history before the
            // final sample is classified, not just one on the last candle.
            for event in outcome.death_crosses() {
                self.state.death_history.record(
                    &event.symbol,
                    DeathCrossMark {
                        tick,
                        sample: event.sample,
                        timestamp: event.timestamp,
                    },
                );
            }
            for event in outcome.crossovers {
                debug!(
                    symbol = %event.symbol,
                    kind = ?event.kind,
                    sample = event.sample,
                    "CycleOrchestrator: crossover"
                );
                self.sink.record(EngineEvent::Crossover(event));
            }

            // No new candle means nothing new to classify.
            if outcome.accepted > 0 {
                updated.push((result.symbol.clone(), result.price));
            }
        }
        report.updated = updated.len();

        // Classifying
        self.set_stage(TickStage::Classifying).await;
        let mut actionable: Vec<(Signal, f64)> = Vec::new();
        for (symbol, price) in updated {
            let current = self.state.tracker.snapshot(&symbol, self.timeframe);
            let classification =
                self.classifier
                    .classify(&symbol, current.as_ref(), &self.state.death_history);
            let crossed = classification.crossover.as_ref().map(|e| e.kind);

            let signal = classification.signal;
            let action = signal.action().to_string();
            self.metrics
                .signals_total
                .with_label_values(&[action.as_str()])
                .inc();
            match signal.action() {
                Action::Buy => report.buys += 1,
                Action::Sell => report.sells += 1,
                Action::Hold => report.holds += 1,
            }
            debug!(
                symbol = %symbol,
                action = %signal.action(),
                confidence = signal.confidence(),
                reasons = ?signal.reasons(),
                crossed = ?crossed,
                "CycleOrchestrator: classified"
            );

            if signal.is_actionable() {
                actionable.push((signal, price));
            }
        }

        // Gating
        self.set_stage(TickStage::Gating).await;
        let mut orders = Vec::new();
        let mut decisions = Vec::with_capacity(actionable.len());
        for (signal, price) in actionable {
            let fresh = self.state.tracker.snapshot(signal.symbol(), self.timeframe);
            let decision = self.gate.admit(&signal, fresh.as_ref());
            let outcome = if decision.admitted { "admitted" } else { "rejected" };
            self.metrics
                .gate_decisions_total
                .with_label_values(&[outcome])
                .inc();

            if decision.admitted {
                report.admitted += 1;
                if let Some(side) = order_side(signal.action()) {
                    orders.push(PendingOrder {
                        symbol: signal.symbol().to_string(),
                        side,
                        price,
                    });
                }
            } else {
                report.rejected += 1;
            }
            decisions.push(decision);
        }
        {
            let mut status = self.status.write().await;
            for decision in decisions {
                status.push_decision(decision);
            }
        }

        // Dispatch
        for order in orders {
            match self.dispatch(&order).await {
                Ok(()) => report.orders_placed += 1,
                Err(e) => {
                    error!(
                        symbol = %order.symbol,
                        side = %order.side,
                        error = %e,
                        "CycleOrchestrator: order failed, not retrying this tick"
                    );
                    report.orders_failed += 1;
                }
            }
        }
        self.set_stage(TickStage::Dispatched).await;

        self.state.tick = tick;
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.publish(&report).await;
        report
    }

    async fn dispatch(&self, order: &PendingOrder) -> Result<(), ExecutionError> {
        if !order.price.is_finite() || order.price <= 0.0 {
            return Err(ExecutionError::InvalidOrder(format!(
                "no usable price for {}",
                order.symbol
            )));
        }
        let quantity = self.config.order_notional / order.price;
        let limit = self.config.order_timeout;

        let placed = match timeout(
            limit,
            self.executor.place_order(&order.symbol, order.side, quantity),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExecutionError::Timeout {
                    symbol: order.symbol.clone(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        };

        info!(
            order_id = %placed.order_id,
            symbol = %placed.symbol,
            side = %placed.side,
            quantity = placed.quantity,
            "CycleOrchestrator: order placed"
        );
        Ok(())
    }

    async fn set_stage(&self, stage: TickStage) {
        self.status.write().await.stage = stage;
        debug!(stage = %stage, "CycleOrchestrator: stage");
    }

    async fn publish(&self, report: &TickReport) {
        let m = &self.metrics;
        m.ticks_total.inc();
        m.last_tick.set(report.tick as i64);
        m.tick_duration_seconds.observe(report.elapsed_ms as f64 / 1000.0);
        m.scan_external_calls_total.inc_by(report.external_calls as u64);
        m.scan_candidates.set(report.candidates as i64);
        m.scan_stale_results_total.inc_by(report.stale as u64);
        if report.snapshot_fallback {
            m.snapshot_fallbacks_total.inc();
        }
        m.data_integrity_errors_total.inc_by(report.integrity_errors as u64);
        m.orders_placed_total.inc_by(report.orders_placed as u64);
        m.orders_failed_total.inc_by(report.orders_failed as u64);

        {
            let mut status = self.status.write().await;
            status.stage = TickStage::Idle;
            status.last_report = Some(report.clone());
        }

        info!(
            tick = report.tick,
            scanned = report.scanned,
            stale = report.stale,
            calls = report.external_calls,
            updated = report.updated,
            signals = report.signals(),
            admitted = report.admitted,
            rejected = report.rejected,
            orders = report.orders_placed,
            failed = report.orders_failed,
            elapsed_ms = report.elapsed_ms,
            "CycleOrchestrator: tick complete"
        );
    }
}

fn order_side(action: Action) -> Option<OrderSide> {
    match action {
        Action::Buy => Some(OrderSide::Buy),
        Action::Sell => Some(OrderSide::Sell),
        Action::Hold => None,
    }
}
