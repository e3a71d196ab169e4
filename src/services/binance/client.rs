//! Binance REST market data client

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::messages::{ExchangeInfo, RawKline, Ticker24h};
use crate::error::MarketDataError;
use crate::models::market::{PricePoint, TickerSnapshot, Timeframe};
use crate::services::market_data::MarketDataProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

pub struct BinanceMarketData {
    base_url: String,
    client: Client,
}

impl BinanceMarketData {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Trading pairs quoted in `quote_asset`, sorted.
    ///
    /// Called once at startup; transient failures are retried with
    /// exponential backoff before giving up.
    pub async fn discover_universe(&self, quote_asset: &str) -> Result<Vec<String>, MarketDataError> {
        let fetch = || async {
            self.get_json::<ExchangeInfo>("/api/v3/exchangeInfo", &[])
                .await
        };

        let info = fetch
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_times(4),
            )
            .when(|e: &MarketDataError| !matches!(e, MarketDataError::Parse(_)))
            .notify(|e: &MarketDataError, delay: Duration| {
                warn!(
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "BinanceMarketData: exchangeInfo failed, retrying"
                );
            })
            .await?;

        let mut pairs: Vec<String> = info
            .symbols
            .into_iter()
            .filter(|s| s.is_trading() && s.quote_asset.eq_ignore_ascii_case(quote_asset))
            .map(|s| s.symbol)
            .collect();
        pairs.sort();

        info!(
            quote_asset = %quote_asset,
            pairs = pairs.len(),
            "BinanceMarketData: discovered {} trading pairs",
            pairs.len()
        );
        Ok(pairs)
    }
}

impl Default for BinanceMarketData {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl MarketDataProvider for BinanceMarketData {
    async fn fetch_snapshot(
        &self,
        pairs: &[String],
    ) -> Result<HashMap<String, TickerSnapshot>, MarketDataError> {
        let tickers: Vec<Ticker24h> = self.get_json("/api/v3/ticker/24hr", &[]).await?;
        let wanted: HashSet<&str> = pairs.iter().map(String::as_str).collect();

        let mut snapshot = HashMap::with_capacity(pairs.len());
        for ticker in tickers {
            if !wanted.contains(ticker.symbol.as_str()) {
                continue;
            }
            match parse_ticker(&ticker) {
                Ok(row) => {
                    snapshot.insert(ticker.symbol, row);
                }
                Err(e) => {
                    debug!(symbol = %ticker.symbol, error = %e, "BinanceMarketData: skipping ticker row");
                }
            }
        }

        debug!(
            requested = pairs.len(),
            received = snapshot.len(),
            "BinanceMarketData: snapshot fetched"
        );
        Ok(snapshot)
    }

    async fn fetch_detail(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let rows: Vec<RawKline> = self
            .get_json(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", timeframe.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let now_ms = Utc::now().timestamp_millis();
        let mut points = Vec::with_capacity(rows.len());
        for row in &rows {
            let kline = parse_kline(row)?;
            // The newest kline is still forming until its close time passes.
            if kline.close_time_ms >= now_ms {
                continue;
            }
            points.push(kline.point);
        }
        Ok(points)
    }
}

fn parse_number(field: &str, raw: &str) -> Result<f64, MarketDataError> {
    raw.parse::<f64>()
        .map_err(|_| MarketDataError::Parse(format!("invalid {} '{}'", field, raw)))
}

fn parse_ticker(ticker: &Ticker24h) -> Result<TickerSnapshot, MarketDataError> {
    Ok(TickerSnapshot {
        price: parse_number("lastPrice", &ticker.last_price)?,
        change_pct: parse_number("priceChangePercent", &ticker.price_change_percent)?,
        volume: parse_number("quoteVolume", &ticker.quote_volume)?,
    })
}

struct ParsedKline {
    point: PricePoint,
    close_time_ms: i64,
}

fn parse_kline(row: &RawKline) -> Result<ParsedKline, MarketDataError> {
    let number_at = |index: usize, field: &str| -> Result<f64, MarketDataError> {
        match row.get(index) {
            Some(serde_json::Value::String(s)) => parse_number(field, s),
            Some(serde_json::Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| MarketDataError::Parse(format!("invalid {}", field))),
            _ => Err(MarketDataError::Parse(format!("kline missing {}", field))),
        }
    };
    let millis_at = |index: usize, field: &str| -> Result<i64, MarketDataError> {
        row.get(index)
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| MarketDataError::Parse(format!("kline missing {}", field)))
    };

    let close = number_at(4, "close")?;
    let volume = number_at(5, "volume")?;
    let close_time_ms = millis_at(6, "closeTime")?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(close_time_ms)
        .ok_or_else(|| MarketDataError::Parse(format!("closeTime {} out of range", close_time_ms)))?;

    Ok(ParsedKline {
        point: PricePoint::new(timestamp, close, volume),
        close_time_ms,
    })
}
