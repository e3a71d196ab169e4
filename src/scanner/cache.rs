//! Scanner-owned state carried between ticks

use std::collections::HashMap;

use crate::models::scan::ScanResult;

#[derive(Debug, Clone, Default)]
pub struct ScannerCache {
    last_results: Vec<ScanResult>,
    volume_baseline: HashMap<String, f64>,
}

impl ScannerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_results(&self) -> &[ScanResult] {
        &self.last_results
    }

    pub fn last_result(&self, symbol: &str) -> Option<&ScanResult> {
        self.last_results.iter().find(|r| r.symbol == symbol)
    }

    /// Previous tick's results, every one marked stale.
    pub fn stale_results(&self) -> Vec<ScanResult> {
        self.last_results
            .iter()
            .cloned()
            .map(ScanResult::mark_stale)
            .collect()
    }

    pub(crate) fn store_results(&mut self, results: &[ScanResult]) {
        self.last_results = results.to_vec();
    }

    /// Ratio of `volume` to the symbol's baseline, then fold `volume` into
    /// the baseline. The first observation has ratio 1.0.
    pub fn observe_volume(&mut self, symbol: &str, volume: f64, alpha: f64) -> f64 {
        let baseline = self
            .volume_baseline
            .entry(symbol.to_string())
            .or_insert(volume);
        let ratio = if *baseline > 0.0 { volume / *baseline } else { 1.0 };
        *baseline = alpha * volume + (1.0 - alpha) * *baseline;
        ratio
    }
}
