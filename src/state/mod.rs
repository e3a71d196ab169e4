//! Engine state and its persistence
//!
//! [`EngineState`] replaces a shared ambient state blob with explicitly
//! owned sections: tracker state, death-cross history, scanner cache. The
//! orchestrator owns it and lends each section to the component that needs it.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::scanner::ScannerCache;
use crate::signals::DeathCrossHistory;
use crate::tracker::{MovingAverageTracker, TrackedSeries};

pub use store::{JsonFileStateStore, StateStore};

pub const STATE_VERSION: u32 = 1;

pub struct EngineState {
    pub tracker: MovingAverageTracker,
    pub death_history: DeathCrossHistory,
    pub scanner_cache: ScannerCache,
    /// Last completed tick
    pub tick: u64,
}

impl EngineState {
    pub fn new(config: &Config) -> Self {
        Self {
            tracker: MovingAverageTracker::new(&config.tracker),
            death_history: DeathCrossHistory::new(config.classifier.lookback_periods as usize),
            scanner_cache: ScannerCache::new(),
            tick: 0,
        }
    }

    /// The fields this engine owns on disk. Scanner cache is not persisted.
    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            tick: self.tick,
            series: self.tracker.export(),
            death_history: self.death_history.clone(),
        }
    }

    pub fn restore(&mut self, persisted: PersistedState) {
        let series = self.tracker.restore(persisted.series);
        self.death_history.merge(persisted.death_history);
        self.tick = self.tick.max(persisted.tick);
        info!(
            tick = self.tick,
            series = series,
            saved_at = %persisted.saved_at,
            "EngineState: restored persisted state"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub tick: u64,
    pub series: Vec<TrackedSeries>,
    pub death_history: DeathCrossHistory,
}
