//! Binance spot market data over the public REST API

pub mod client;
pub mod messages;

pub use client::{BinanceMarketData, DEFAULT_BASE_URL};
