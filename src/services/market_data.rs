//! Market data provider interface.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::MarketDataError;
use crate::models::market::{PricePoint, TickerSnapshot, Timeframe};

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// One batched round trip returning a snapshot row for every known pair
    /// in `pairs`. Pairs the exchange does not report are simply absent.
    async fn fetch_snapshot(
        &self,
        pairs: &[String],
    ) -> Result<HashMap<String, TickerSnapshot>, MarketDataError>;

    /// Closed candles for `symbol`, oldest first, as price points.
    async fn fetch_detail(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PricePoint>, MarketDataError>;
}
