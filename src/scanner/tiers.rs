//! Static tier assignment and per-tier thresholds

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::market::Tier;

/// Minimum absolute 24h change (percent) for a pair to become a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub tier1_change_pct: f64,
    pub tier2_change_pct: f64,
    pub tier3_change_pct: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            tier1_change_pct: 3.0,
            tier2_change_pct: 5.0,
            tier3_change_pct: 8.0,
        }
    }
}

impl TierThresholds {
    pub fn change_threshold(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Tier1 => self.tier1_change_pct,
            Tier::Tier2 => self.tier2_change_pct,
            Tier::Tier3 => self.tier3_change_pct,
        }
    }
}

/// Symbol → tier lookup. Anything unlisted is tier 3.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    assignments: HashMap<String, Tier>,
}

impl TierTable {
    pub fn new(tier1: &[String], tier2: &[String]) -> Self {
        let mut assignments = HashMap::new();
        for symbol in tier2 {
            assignments.insert(symbol.to_uppercase(), Tier::Tier2);
        }
        // Tier 1 wins if a symbol is listed twice.
        for symbol in tier1 {
            assignments.insert(symbol.to_uppercase(), Tier::Tier1);
        }
        Self { assignments }
    }

    pub fn tier_of(&self, symbol: &str) -> Tier {
        self.assignments
            .get(symbol)
            .copied()
            .unwrap_or(Tier::Tier3)
    }
}
