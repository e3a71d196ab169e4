//! Moving-average tracker
//!
//! Owns short/long EMA state per (symbol, timeframe). State only changes in
//! [`MovingAverageTracker::update`] / [`MovingAverageTracker::update_batch`];
//! everything else hands out clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::indicators::trend::{check_ema_cross, ema_from_previous, separation};
use crate::models::market::{PricePoint, Timeframe};
use crate::models::signal::{CrossoverEvent, CrossoverKind};

/// EMA for one window length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEma {
    window: usize,
    value: Option<f64>,
    previous: Option<f64>,
    samples: u64,
    seed_sum: f64,
}

impl WindowEma {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            value: None,
            previous: None,
            samples: 0,
            seed_sum: 0.0,
        }
    }

    /// Rehydrate a window that already has `previous` and `current` values.
    pub fn with_values(window: usize, previous: f64, current: f64) -> Self {
        Self {
            window,
            value: Some(current),
            previous: Some(previous),
            samples: window as u64 + 1,
            seed_sum: 0.0,
        }
    }

    fn push(&mut self, price: f64) {
        self.samples += 1;
        match self.value {
            Some(current) => {
                self.previous = Some(current);
                self.value = Some(ema_from_previous(price, current, self.window));
            }
            None => {
                self.seed_sum += price;
                if self.samples >= self.window as u64 {
                    self.value = Some(self.seed_sum / self.window as f64);
                }
            }
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Current EMA, once `window` samples have been seen
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// EMA before the most recent sample
    pub fn previous(&self) -> Option<f64> {
        self.previous
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Same window placed at series position `samples`.
    pub fn at_sample(mut self, samples: u64) -> Self {
        self.samples = samples;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }
}

/// Short and long EMA for one (symbol, timeframe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaState {
    pub timeframe: Timeframe,
    pub short: WindowEma,
    pub long: WindowEma,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_price: Option<f64>,
}

impl EmaState {
    pub fn new(timeframe: Timeframe, short_window: usize, long_window: usize) -> Self {
        Self {
            timeframe,
            short: WindowEma::new(short_window),
            long: WindowEma::new(long_window),
            last_timestamp: None,
            last_price: None,
        }
    }

    /// Build a state directly from EMA values (replay, fixtures).
    pub fn from_values(
        timeframe: Timeframe,
        short: WindowEma,
        long: WindowEma,
    ) -> Self {
        Self {
            timeframe,
            short,
            long,
            last_timestamp: None,
            last_price: None,
        }
    }

    fn apply(&mut self, point: &PricePoint) {
        self.short.push(point.price);
        self.long.push(point.price);
        self.last_timestamp = Some(point.timestamp);
        self.last_price = Some(point.price);
    }

    /// Both windows valid with a previous value: crossovers can be evaluated.
    pub fn is_ready(&self) -> bool {
        self.short.previous.is_some() && self.long.previous.is_some()
    }

    /// Current short EMA below current long EMA. `None` until both are valid.
    pub fn is_bearish(&self) -> Option<bool> {
        Some(self.short.value? < self.long.value?)
    }

    /// Relative distance of short over long. `None` until both are valid.
    pub fn separation(&self) -> Option<f64> {
        Some(separation(self.short.value?, self.long.value?))
    }

    /// Samples applied to this series so far
    pub fn samples(&self) -> u64 {
        self.long.samples
    }

    /// Crossover produced by the most recent sample, if any.
    pub fn crossover(&self) -> Option<CrossoverKind> {
        check_ema_cross(
            self.short.previous?,
            self.long.previous?,
            self.short.value?,
            self.long.value?,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    symbol: String,
    timeframe: Timeframe,
}

/// Serializable form of one tracked series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedSeries {
    pub symbol: String,
    pub state: EmaState,
}

/// Outcome of applying a batch of price points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchUpdate {
    pub accepted: usize,
    /// Points at or before the last accepted timestamp (already applied).
    pub skipped: usize,
    pub rejected: Vec<TrackerError>,
    /// Every crossover the batch produced, oldest first
    pub crossovers: Vec<CrossoverEvent>,
}

impl BatchUpdate {
    pub fn death_crosses(&self) -> impl Iterator<Item = &CrossoverEvent> {
        self.crossovers
            .iter()
            .filter(|e| e.kind == CrossoverKind::Death)
    }
}

pub struct MovingAverageTracker {
    short_window: usize,
    long_window: usize,
    series: HashMap<SeriesKey, EmaState>,
}

impl MovingAverageTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            short_window: config.short_window,
            long_window: config.long_window,
            series: HashMap::new(),
        }
    }

    /// Apply one sample. Invalid samples are dropped and leave state untouched.
    pub fn update(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        point: PricePoint,
    ) -> Result<EmaState, TrackerError> {
        if !point.price.is_finite() || point.price <= 0.0 {
            return Err(TrackerError::InvalidPrice {
                symbol: symbol.to_string(),
                price: point.price,
            });
        }

        let key = SeriesKey {
            symbol: symbol.to_string(),
            timeframe,
        };
        let (short_window, long_window) = (self.short_window, self.long_window);
        let state = self
            .series
            .entry(key)
            .or_insert_with(|| EmaState::new(timeframe, short_window, long_window));

        if let Some(last) = state.last_timestamp {
            if point.timestamp < last {
                return Err(TrackerError::TimestampRegression {
                    symbol: symbol.to_string(),
                    timeframe,
                    last,
                    received: point.timestamp,
                });
            }
        }

        state.apply(&point);
        Ok(state.clone())
    }

    /// Apply every point newer than what the series has already seen.
    ///
    /// Overlap with earlier fetches is skipped silently; integrity errors are
    /// collected and logged, and the remaining points still apply.
    pub fn update_batch(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        points: &[PricePoint],
    ) -> BatchUpdate {
        let watermark = self
            .snapshot(symbol, timeframe)
            .and_then(|s| s.last_timestamp);
        let mut outcome = BatchUpdate::default();

        for point in points {
            if matches!(watermark, Some(seen) if point.timestamp <= seen) {
                outcome.skipped += 1;
                continue;
            }
            match self.update(symbol, timeframe, *point) {
                Ok(state) => {
                    outcome.accepted += 1;
                    if let Some(kind) = state.crossover() {
                        outcome.crossovers.push(CrossoverEvent {
                            symbol: symbol.to_string(),
                            timestamp: point.timestamp,
                            kind,
                            sample: state.samples(),
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        timeframe = %timeframe,
                        error = %e,
                        "Tracker: dropped price sample"
                    );
                    outcome.rejected.push(e);
                }
            }
        }

        debug!(
            symbol = %symbol,
            timeframe = %timeframe,
            accepted = outcome.accepted,
            skipped = outcome.skipped,
            rejected = outcome.rejected.len(),
            crossovers = outcome.crossovers.len(),
            "Tracker: batch applied"
        );
        outcome
    }

    pub fn snapshot(&self, symbol: &str, timeframe: Timeframe) -> Option<EmaState> {
        self.series
            .get(&SeriesKey {
                symbol: symbol.to_string(),
                timeframe,
            })
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// All series, sorted by symbol then timeframe
    pub fn export(&self) -> Vec<TrackedSeries> {
        let mut out: Vec<TrackedSeries> = self
            .series
            .iter()
            .map(|(key, state)| TrackedSeries {
                symbol: key.symbol.clone(),
                state: state.clone(),
            })
            .collect();
        out.sort_by(|a, b| {
            a.symbol
                .cmp(&b.symbol)
                .then(a.state.timeframe.cmp(&b.state.timeframe))
        });
        out
    }

    /// Load persisted series. Series built with different window lengths are
    /// discarded and will warm up again from fresh history.
    pub fn restore(&mut self, series: Vec<TrackedSeries>) -> usize {
        let mut restored = 0;
        for entry in series {
            if entry.state.short.window != self.short_window
                || entry.state.long.window != self.long_window
            {
                warn!(
                    symbol = %entry.symbol,
                    "Tracker: discarding persisted series with mismatched windows"
                );
                continue;
            }
            self.series.insert(
                SeriesKey {
                    symbol: entry.symbol,
                    timeframe: entry.state.timeframe,
                },
                entry.state,
            );
            restored += 1;
        }
        restored
    }
}
