//! Binance public REST payloads

use serde::Deserialize;

/// Row of `GET /api/v3/ticker/24hr` (no symbol filter returns every pair).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: String,
    pub price_change_percent: String,
    pub quote_volume: String,
}

/// `GET /api/v3/exchangeInfo`
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub quote_asset: String,
}

impl SymbolInfo {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }
}

/// One kline row. Binance sends each kline as a heterogeneous JSON array:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
pub type RawKline = Vec<serde_json::Value>;
