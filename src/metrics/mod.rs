//! Prometheus metrics

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    // Orchestrator
    pub ticks_total: IntCounter,
    pub tick_overruns_total: IntCounter,
    pub tick_duration_seconds: Histogram,
    pub last_tick: IntGauge,

    // Scanner
    pub scan_external_calls_total: IntCounter,
    pub scan_candidates: IntGauge,
    pub scan_stale_results_total: IntCounter,
    pub snapshot_fallbacks_total: IntCounter,

    // Tracker / classifier / gate
    pub data_integrity_errors_total: IntCounter,
    pub signals_total: IntCounterVec,
    pub gate_decisions_total: IntCounterVec,

    // Execution
    pub orders_placed_total: IntCounter,
    pub orders_failed_total: IntCounter,

    // HTTP
    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: Gauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ticks_total = IntCounter::with_opts(Opts::new("ticks_total", "Completed engine ticks"))?;
        let tick_overruns_total = IntCounter::with_opts(Opts::new(
            "tick_overruns_total",
            "Ticks that took longer than the loop interval",
        ))?;
        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("tick_duration_seconds", "Wall-clock duration of a tick")
                .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        let last_tick = IntGauge::with_opts(Opts::new("last_tick", "Number of the last completed tick"))?;

        let scan_external_calls_total = IntCounter::with_opts(Opts::new(
            "scan_external_calls_total",
            "External market-data calls made by the scanner",
        ))?;
        let scan_candidates = IntGauge::with_opts(Opts::new(
            "scan_candidates",
            "Phase 1 candidates in the last scan",
        ))?;
        let scan_stale_results_total = IntCounter::with_opts(Opts::new(
            "scan_stale_results_total",
            "Scan results served stale",
        ))?;
        let snapshot_fallbacks_total = IntCounter::with_opts(Opts::new(
            "snapshot_fallbacks_total",
            "Ticks served from the previous snapshot cache",
        ))?;

        let data_integrity_errors_total = IntCounter::with_opts(Opts::new(
            "data_integrity_errors_total",
            "Price samples dropped by the tracker",
        ))?;
        let signals_total = IntCounterVec::new(
            Opts::new("signals_total", "Classified signals by action"),
            &["action"],
        )?;
        let gate_decisions_total = IntCounterVec::new(
            Opts::new("gate_decisions_total", "Protection gate decisions by outcome"),
            &["outcome"],
        )?;

        let orders_placed_total =
            IntCounter::with_opts(Opts::new("orders_placed_total", "Orders accepted by the executor"))?;
        let orders_failed_total =
            IntCounter::with_opts(Opts::new("orders_failed_total", "Orders that failed or timed out"))?;

        let http_requests_total =
            IntCounter::with_opts(Opts::new("http_requests_total", "Total HTTP requests"))?;
        let http_requests_in_flight =
            Gauge::with_opts(Opts::new("http_requests_in_flight", "HTTP requests in flight"))?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration",
        ))?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(tick_overruns_total.clone()))?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;
        registry.register(Box::new(last_tick.clone()))?;
        registry.register(Box::new(scan_external_calls_total.clone()))?;
        registry.register(Box::new(scan_candidates.clone()))?;
        registry.register(Box::new(scan_stale_results_total.clone()))?;
        registry.register(Box::new(snapshot_fallbacks_total.clone()))?;
        registry.register(Box::new(data_integrity_errors_total.clone()))?;
        registry.register(Box::new(signals_total.clone()))?;
        registry.register(Box::new(gate_decisions_total.clone()))?;
        registry.register(Box::new(orders_placed_total.clone()))?;
        registry.register(Box::new(orders_failed_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            tick_overruns_total,
            tick_duration_seconds,
            last_tick,
            scan_external_calls_total,
            scan_candidates,
            scan_stale_results_total,
            snapshot_fallbacks_total,
            data_integrity_errors_total,
            signals_total,
            gate_decisions_total,
            orders_placed_total,
            orders_failed_total,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Render every registered metric in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
