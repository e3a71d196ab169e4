//! Death-cross history used by the lookback rule

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathCrossMark {
    /// Orchestrator tick the death cross was observed on
    pub tick: u64,
    /// Series position of the sample that produced it
    #[serde(default)]
    pub sample: u64,
    pub timestamp: DateTime<Utc>,
}

/// Last `capacity` death crosses per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathCrossHistory {
    capacity: usize,
    marks: HashMap<String, VecDeque<DeathCrossMark>>,
}

impl DeathCrossHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            marks: HashMap::new(),
        }
    }

    pub fn record(&mut self, symbol: &str, mark: DeathCrossMark) {
        let marks = self.marks.entry(symbol.to_string()).or_default();
        marks.push_back(mark);
        while marks.len() > self.capacity {
            marks.pop_front();
        }
    }

    /// A death cross happened at most `lookback` samples before `sample`
    /// in the symbol's own series.
    pub fn has_recent(&self, symbol: &str, sample: u64, lookback: u64) -> bool {
        self.marks
            .get(symbol)
            .map(|marks| {
                marks
                    .iter()
                    .any(|m| m.sample <= sample && sample - m.sample <= lookback)
            })
            .unwrap_or(false)
    }

    pub fn latest(&self, symbol: &str) -> Option<DeathCrossMark> {
        self.marks.get(symbol).and_then(|m| m.back().copied())
    }

    pub fn marks(&self, symbol: &str) -> Vec<DeathCrossMark> {
        self.marks
            .get(symbol)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Adopt persisted marks, trimmed to this history's capacity.
    pub fn merge(&mut self, other: DeathCrossHistory) {
        for (symbol, marks) in other.marks {
            for mark in marks {
                self.record(&symbol, mark);
            }
        }
    }
}
