//! Classifier output types.
//!
//! `Signal` is built through one constructor per classification outcome, so
//! the only way to get a buy is [`Signal::golden_cross`], which carries
//! nothing but `GoldenCrossDetected`. [`Signal::from_parts`] exists for
//! rehydrating signals from outside the classifier and is exactly the input
//! the protection gate is there to distrust.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => f.write_str("buy"),
            Action::Sell => f.write_str("sell"),
            Action::Hold => f.write_str("hold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReasonCode {
    DeathCrossDetected,
    BearishTrendDetected,
    RecentDeathCrossDetected,
    GoldenCrossDetected,
    DataUnavailable,
    /// Gate-only: a fresh recomputation shows short EMA below long EMA.
    FreshTrendBearish,
}

impl ReasonCode {
    /// Reasons that must never accompany a buy.
    pub const BEARISH: [ReasonCode; 3] = [
        ReasonCode::DeathCrossDetected,
        ReasonCode::BearishTrendDetected,
        ReasonCode::RecentDeathCrossDetected,
    ];

    pub fn is_bearish(&self) -> bool {
        Self::BEARISH.contains(self)
    }
}

pub type ReasonSet = BTreeSet<ReasonCode>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    symbol: String,
    action: Action,
    confidence: f64,
    reasons: ReasonSet,
}

impl Signal {
    /// Short EMA just crossed below long EMA.
    pub fn death_cross(symbol: impl Into<String>, confidence: f64) -> Self {
        Self::build(symbol, Action::Sell, confidence, [ReasonCode::DeathCrossDetected])
    }

    /// Short EMA already below long EMA.
    pub fn bearish_trend(symbol: impl Into<String>, confidence: f64) -> Self {
        Self::build(symbol, Action::Hold, confidence, [ReasonCode::BearishTrendDetected])
    }

    /// A death cross happened within the lookback window.
    pub fn recent_death_cross(symbol: impl Into<String>, confidence: f64) -> Self {
        Self::build(
            symbol,
            Action::Hold,
            confidence,
            [ReasonCode::RecentDeathCrossDetected],
        )
    }

    /// Short EMA just crossed above long EMA with no bearish evidence.
    pub fn golden_cross(symbol: impl Into<String>, confidence: f64) -> Self {
        Self::build(symbol, Action::Buy, confidence, [ReasonCode::GoldenCrossDetected])
    }

    /// Not enough history to evaluate both windows.
    pub fn data_unavailable(symbol: impl Into<String>) -> Self {
        Self::build(symbol, Action::Hold, 0.0, [ReasonCode::DataUnavailable])
    }

    /// No crossover and no bearish evidence.
    pub fn neutral(symbol: impl Into<String>, confidence: f64) -> Self {
        Self::build(symbol, Action::Hold, confidence, [])
    }

    /// Raw constructor for signals that did not come from the classifier
    /// (deserialized, replayed, or synthetic). No combination is rejected here.
    pub fn from_parts(
        symbol: impl Into<String>,
        action: Action,
        confidence: f64,
        reasons: impl IntoIterator<Item = ReasonCode>,
    ) -> Self {
        Self::build(symbol, action, confidence, reasons)
    }

    fn build(
        symbol: impl Into<String>,
        action: Action,
        confidence: f64,
        reasons: impl IntoIterator<Item = ReasonCode>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            confidence: clamp_confidence(confidence),
            reasons: reasons.into_iter().collect(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reasons(&self) -> &ReasonSet {
        &self.reasons
    }

    pub fn has_reason(&self, reason: ReasonCode) -> bool {
        self.reasons.contains(&reason)
    }

    pub fn is_actionable(&self) -> bool {
        self.action != Action::Hold
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverKind {
    Golden,
    Death,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverEvent {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub kind: CrossoverKind,
    /// Position of the sample in the symbol's series
    pub sample: u64,
}
