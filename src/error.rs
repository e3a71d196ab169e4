//! Error taxonomy for the engine.
//!
//! Every per-symbol failure is one of these and is contained to that symbol
//! for the current tick. Failures only become fatal at startup, through
//! [`Error`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::market::Timeframe;

/// Invalid or unparsable configuration. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to parse {field} from '{value}'")]
    Parse { field: &'static str, value: String },
}

/// Failures talking to the market-data collaborator.
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: String,
        timeout_ms: u64,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed market data: {0}")]
    Parse(String),

    #[error("{0}")]
    Unavailable(String),
}

impl MarketDataError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, MarketDataError::Timeout { .. })
    }
}

/// Rejected price samples. The sample is dropped, prior state is kept.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("non-positive price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("timestamp went backwards for {symbol}/{timeframe}: {received} < {last}")]
    TimestampRegression {
        symbol: String,
        timeframe: Timeframe,
        last: DateTime<Utc>,
        received: DateTime<Utc>,
    },
}

/// Order placement failures. Never retried within the same tick.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("order for {symbol} timed out after {timeout_ms}ms")]
    Timeout { symbol: String, timeout_ms: u64 },

    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

/// Persisted-state load/save failures.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Startup failures surfaced by the worker binary.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("trading universe is empty")]
    EmptyUniverse,
}

pub type Result<T> = std::result::Result<T, Error>;
