//! Two-phase opportunity scanner
//!
//! Phase 1 makes one batched snapshot call for the whole universe and keeps
//! only pairs that move past their tier's change threshold or surge in volume.
//! Phase 2 enriches those candidates, plus every tier-1 pair, with one
//! time-boxed detail fetch each on a bounded pool. A tick therefore costs at
//! most `1 + |candidates| + |tier1|` external calls, however large the
//! universe is.

pub mod cache;
pub mod tiers;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::error::MarketDataError;
use crate::models::market::{PricePoint, Tier, TickerSnapshot};
use crate::models::scan::ScanResult;
use crate::services::market_data::MarketDataProvider;

pub use cache::ScannerCache;
pub use tiers::{TierTable, TierThresholds};

/// Candles preceding the newest one used as its volume baseline.
const VOLUME_LOOKBACK: usize = 20;

/// One tick's scan.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Tier first, then score descending.
    pub results: Vec<ScanResult>,
    /// Price history fetched in Phase 2, keyed by symbol (fresh results only).
    pub history: HashMap<String, Vec<PricePoint>>,
    pub external_calls: usize,
    pub candidates: usize,
    /// Phase 1 failed and `results` is the previous tick's cache.
    pub snapshot_fallback: bool,
}

impl ScanReport {
    pub fn stale_count(&self) -> usize {
        self.results.iter().filter(|r| r.stale).count()
    }

    pub fn fresh(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(|r| !r.stale)
    }
}

pub struct OpportunityScanner {
    provider: Arc<dyn MarketDataProvider>,
    config: ScannerConfig,
}

impl OpportunityScanner {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: ScannerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub async fn scan(&self, universe: &[String], cache: &mut ScannerCache) -> ScanReport {
        let snapshot = match self.fetch_snapshot(universe).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    error = %e,
                    cached = cache.last_results().len(),
                    "Scanner: snapshot failed, serving previous tick's results as stale"
                );
                return ScanReport {
                    results: cache.stale_results(),
                    history: HashMap::new(),
                    external_calls: 1,
                    candidates: 0,
                    snapshot_fallback: true,
                };
            }
        };

        // Phase 1: filter
        let mut enrich = Vec::new();
        let mut candidates = 0;
        for symbol in universe {
            let tier = self.config.tiers.tier_of(symbol);
            let Some(row) = snapshot.get(symbol) else {
                if tier == Tier::Tier1 {
                    debug!(symbol = %symbol, "Scanner: tier-1 pair missing from snapshot, enriching anyway");
                    enrich.push(self.unlisted_result(symbol, cache));
                }
                continue;
            };
            let volume_ratio = cache.observe_volume(symbol, row.volume, self.config.volume_baseline_alpha);
            let result = self.phase1_result(symbol, row, tier, volume_ratio);

            let is_candidate = self.is_candidate(&result);
            if is_candidate {
                candidates += 1;
            }
            if is_candidate || tier == Tier::Tier1 {
                enrich.push(result);
            }
        }
        sort_by_priority(&mut enrich);

        // Budget: tier 1 first, then best-scoring candidates.
        let phase2_budget = self.config.max_calls_per_tick.saturating_sub(1);
        let deferred = if enrich.len() > phase2_budget {
            enrich.split_off(phase2_budget)
        } else {
            Vec::new()
        };
        if !deferred.is_empty() {
            warn!(
                selected = enrich.len(),
                deferred = deferred.len(),
                budget = self.config.max_calls_per_tick,
                "Scanner: call budget exceeded, deferring lowest-priority candidates"
            );
        }

        // Phase 2: enrich
        let external_calls = 1 + enrich.len();
        let (mut results, history) = self.enrich(enrich).await;
        results.extend(deferred.into_iter().map(ScanResult::mark_stale));
        sort_by_priority(&mut results);

        info!(
            universe = universe.len(),
            snapshot_rows = snapshot.len(),
            candidates = candidates,
            results = results.len(),
            stale = results.iter().filter(|r| r.stale).count(),
            calls = external_calls,
            "Scanner: tick scanned"
        );

        cache.store_results(&results);
        ScanReport {
            results,
            history,
            external_calls,
            candidates,
            snapshot_fallback: false,
        }
    }

    async fn fetch_snapshot(
        &self,
        universe: &[String],
    ) -> Result<HashMap<String, TickerSnapshot>, MarketDataError> {
        let limit = self.config.snapshot_timeout;
        match timeout(limit, self.provider.fetch_snapshot(universe)).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout {
                operation: "snapshot".to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }

    fn phase1_result(
        &self,
        symbol: &str,
        row: &TickerSnapshot,
        tier: Tier,
        volume_ratio: f64,
    ) -> ScanResult {
        let mut result = ScanResult {
            symbol: symbol.to_string(),
            price: row.price,
            change_pct: row.change_pct,
            volume_ratio,
            tier,
            stale: false,
            fetched_at: Utc::now(),
            score: 0.0,
        };
        result.score = self.score(&result);
        result
    }

    /// Placeholder for a pair the snapshot did not return. Carries the last
    /// known price until Phase 2 replaces it.
    fn unlisted_result(&self, symbol: &str, cache: &ScannerCache) -> ScanResult {
        let row = TickerSnapshot {
            price: cache.last_result(symbol).map(|r| r.price).unwrap_or(0.0),
            change_pct: 0.0,
            volume: 0.0,
        };
        self.phase1_result(symbol, &row, self.config.tiers.tier_of(symbol), 1.0)
    }

    fn is_candidate(&self, result: &ScanResult) -> bool {
        let threshold = self.config.thresholds.change_threshold(result.tier);
        result.change_pct.abs() >= threshold || result.volume_ratio >= self.config.surge_threshold
    }

    fn score(&self, result: &ScanResult) -> f64 {
        let threshold = self.config.thresholds.change_threshold(result.tier);
        result.change_pct.abs() / threshold + result.volume_ratio / self.config.surge_threshold
    }

    /// Fan out detail fetches on the bounded pool and wait for all of them.
    async fn enrich(
        &self,
        selected: Vec<ScanResult>,
    ) -> (Vec<ScanResult>, HashMap<String, Vec<PricePoint>>) {
        let provider = &self.provider;
        let timeframe = self.config.timeframe;
        let limit = self.config.detail_limit;
        let deadline = self.config.detail_timeout;

        let fetched: Vec<(ScanResult, Result<Vec<PricePoint>, MarketDataError>)> =
            stream::iter(selected)
                .map(|result| async move {
                    let outcome =
                        match timeout(deadline, provider.fetch_detail(&result.symbol, timeframe, limit)).await {
                            Ok(outcome) => outcome,
                            Err(_) => Err(MarketDataError::Timeout {
                                operation: format!("detail {}", result.symbol),
                                timeout_ms: deadline.as_millis() as u64,
                            }),
                        };
                    (result, outcome)
                })
                .buffer_unordered(self.config.worker_pool_size)
                .collect()
                .await;

        let mut results = Vec::with_capacity(fetched.len());
        let mut history = HashMap::new();
        for (result, outcome) in fetched {
            match outcome {
                Ok(points) if !points.is_empty() => {
                    let enriched = self.confirm(result, &points);
                    history.insert(enriched.symbol.clone(), points);
                    results.push(enriched);
                }
                Ok(_) => {
                    debug!(symbol = %result.symbol, "Scanner: empty detail, marking stale");
                    results.push(result.mark_stale());
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!(symbol = %result.symbol, error = %e, "Scanner: detail fetch timed out");
                    } else {
                        warn!(symbol = %result.symbol, error = %e, "Scanner: detail fetch failed");
                    }
                    results.push(result.mark_stale());
                }
            }
        }
        (results, history)
    }

    /// Re-score a candidate from its detailed history.
    fn confirm(&self, mut result: ScanResult, points: &[PricePoint]) -> ScanResult {
        if let Some((last, earlier)) = points.split_last() {
            result.price = last.price;
            let window = &earlier[earlier.len().saturating_sub(VOLUME_LOOKBACK)..];
            if !window.is_empty() {
                let mean = window.iter().map(|p| p.volume).sum::<f64>() / window.len() as f64;
                if mean > 0.0 {
                    result.volume_ratio = last.volume / mean;
                }
            }
        }
        result.fetched_at = Utc::now();
        result.score = self.score(&result);
        result
    }
}

fn sort_by_priority(results: &mut [ScanResult]) {
    results.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then(b.score.total_cmp(&a.score))
            .then(a.symbol.cmp(&b.symbol))
    });
}
