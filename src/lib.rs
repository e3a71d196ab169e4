//! Crossguard signal engine
//!
//! Classifies EMA crossovers into trade actions, re-validates every buy
//! through a protection gate before it reaches the exchange, and scans a
//! large pair universe for price/volume anomalies under a fixed per-tick
//! call budget.
//!
//! Layers, leaf-first:
//! - [`tracker`]: incremental short/long EMA state per symbol and timeframe
//! - [`signals`]: crossover classification with death-cross lookback
//! - [`protection`]: the pre-execution gate
//! - [`scanner`]: two-phase batched opportunity scanner
//! - [`core`]: tick orchestration and the status HTTP surface
//! - [`services`]: exchange, execution and event-sink collaborators

pub mod config;
pub mod core;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod protection;
pub mod scanner;
pub mod services;
pub mod signals;
pub mod state;
pub mod tracker;

pub use error::{Error, Result};
