use serde::{Deserialize, Serialize};

use crate::models::signal::{Action, CrossoverEvent, ReasonSet};

/// Gate verdict for one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionDecision {
    pub symbol: String,
    pub action: Action,
    pub admitted: bool,
    pub blocking_reasons: ReasonSet,
}

/// Everything the engine reports to the event/learning sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Protection(ProtectionDecision),
    Crossover(CrossoverEvent),
}
