//! EMA crossover classifier
//!
//! Rules are evaluated in a fixed order and the first match wins. Bearish
//! evidence is checked before bullish evidence, and a recent death cross
//! suppresses buys for `lookback_periods` samples of the symbol's series.

use chrono::{DateTime, Utc};

use crate::config::ClassifierConfig;
use crate::indicators::trend::separation;
use crate::models::signal::{CrossoverEvent, CrossoverKind, Signal};
use crate::signals::history::DeathCrossHistory;
use crate::signals::scoring::{separation_confidence, trend_confidence};
use crate::tracker::EmaState;

/// Classifier output: the signal plus the crossover it observed, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub signal: Signal,
    pub crossover: Option<CrossoverEvent>,
}

impl Classification {
    fn without_crossover(signal: Signal) -> Self {
        Self {
            signal,
            crossover: None,
        }
    }
}

pub struct SignalClassifier {
    config: ClassifierConfig,
}

impl SignalClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify `symbol` from its latest EMA state and death-cross history.
    ///
    /// Pure: death crosses must already be in `history`, including ones an
    /// earlier sample of the same batch produced.
    pub fn classify(
        &self,
        symbol: &str,
        state: Option<&EmaState>,
        history: &DeathCrossHistory,
    ) -> Classification {
        let Some((state, lines)) = state.and_then(|s| EmaLines::from_state(s).map(|l| (s, l)))
        else {
            return Classification::without_crossover(Signal::data_unavailable(symbol));
        };

        let timestamp = state.last_timestamp.unwrap_or_else(DateTime::<Utc>::default);
        let crossover = state.crossover().map(|kind| CrossoverEvent {
            symbol: symbol.to_string(),
            timestamp,
            kind,
            sample: state.samples(),
        });
        let crossed = crossover.as_ref().map(|e| e.kind);

        // 1. death cross
        if crossed == Some(CrossoverKind::Death) {
            return Classification {
                signal: Signal::death_cross(symbol, self.config.death_cross_confidence),
                crossover,
            };
        }

        // 2. bearish regime
        if lines.short < lines.long {
            return Classification {
                signal: Signal::bearish_trend(symbol, self.config.bearish_hold_confidence),
                crossover,
            };
        }

        // 3. recent death cross
        if history.has_recent(symbol, state.samples(), self.config.lookback_periods) {
            return Classification {
                signal: Signal::recent_death_cross(
                    symbol,
                    self.config.recent_death_hold_confidence,
                ),
                crossover,
            };
        }

        let spread = separation(lines.short, lines.long);

        // 4. golden cross
        if crossed == Some(CrossoverKind::Golden) {
            let confidence = trend_confidence(
                spread,
                self.config.buy_base_confidence,
                self.config.trend_strength_scale,
            );
            return Classification {
                signal: Signal::golden_cross(symbol, confidence),
                crossover,
            };
        }

        // 5. no crossover
        Classification {
            signal: Signal::neutral(
                symbol,
                separation_confidence(spread, self.config.trend_strength_scale),
            ),
            crossover,
        }
    }
}

/// Current lines of a state that can be classified.
#[derive(Debug, Clone, Copy)]
struct EmaLines {
    short: f64,
    long: f64,
}

impl EmaLines {
    fn from_state(state: &EmaState) -> Option<Self> {
        if !state.is_ready() {
            return None;
        }
        Some(Self {
            short: state.short.value()?,
            long: state.long.value()?,
        })
    }
}
