//! Shared data models spanning the engine layers.

pub mod market;
pub mod protection;
pub mod scan;
pub mod signal;

pub use market::{OrderResult, OrderSide, PricePoint, TickerSnapshot, Tier, Timeframe};
pub use protection::{EngineEvent, ProtectionDecision};
pub use scan::ScanResult;
pub use signal::{Action, CrossoverEvent, CrossoverKind, ReasonCode, ReasonSet, Signal};
