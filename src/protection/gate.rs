//! Pre-execution protection gate.
//!
//! Runs immediately before an order is placed and trusts nothing the
//! classifier says. Every check runs on every call so the blocking reason set
//! is complete.

use std::sync::Arc;
use tracing::{info, warn};

use crate::models::protection::{EngineEvent, ProtectionDecision};
use crate::models::signal::{Action, ReasonCode, ReasonSet, Signal};
use crate::services::events::EventSink;
use crate::tracker::EmaState;

pub struct ProtectionGate {
    sink: Arc<dyn EventSink>,
}

impl ProtectionGate {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Decide whether `signal` may be executed given the freshest EMA state.
    ///
    /// Pure and idempotent.
    pub fn evaluate(signal: &Signal, fresh: Option<&EmaState>) -> ProtectionDecision {
        let mut blocking = ReasonSet::new();

        if signal.action() == Action::Buy {
            // Bearish flags attached to a buy.
            blocking.extend(signal.reasons().iter().copied().filter(ReasonCode::is_bearish));

            // Trend re-check against fresh state.
            match fresh.and_then(EmaState::is_bearish) {
                Some(true) => {
                    blocking.insert(ReasonCode::FreshTrendBearish);
                }
                Some(false) => {}
                None => {
                    blocking.insert(ReasonCode::DataUnavailable);
                }
            }
        }

        ProtectionDecision {
            symbol: signal.symbol().to_string(),
            action: signal.action(),
            admitted: blocking.is_empty(),
            blocking_reasons: blocking,
        }
    }

    /// [`Self::evaluate`] and report the decision to the log and event sink.
    pub fn admit(&self, signal: &Signal, fresh: Option<&EmaState>) -> ProtectionDecision {
        let decision = Self::evaluate(signal, fresh);

        if decision.admitted {
            info!(
                symbol = %decision.symbol,
                action = %decision.action,
                confidence = signal.confidence(),
                "ProtectionGate: admitted"
            );
        } else {
            warn!(
                symbol = %decision.symbol,
                action = %decision.action,
                reasons = ?decision.blocking_reasons,
                signal_reasons = ?signal.reasons(),
                "ProtectionGate: rejected"
            );
        }

        self.sink.record(EngineEvent::Protection(decision.clone()));
        decision
    }
}
