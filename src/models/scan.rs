use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::market::Tier;

/// Per-symbol scanner output for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    pub price: f64,
    pub change_pct: f64,
    pub volume_ratio: f64,
    pub tier: Tier,
    /// Older than the current tick: cache fallback or failed enrichment.
    pub stale: bool,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub score: f64,
}

impl ScanResult {
    pub fn mark_stale(mut self) -> Self {
        self.stale = true;
        self
    }
}
