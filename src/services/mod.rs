//! External collaborators: market data, order execution, event sinks.

pub mod binance;
pub mod events;
pub mod execution;
pub mod market_data;

pub use events::{EventSink, FanoutEventSink, JsonlEventSink, TracingEventSink};
pub use execution::{OrderExecutor, PaperOrderExecutor};
pub use market_data::MarketDataProvider;
