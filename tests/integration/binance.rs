//! Binance REST client against a mocked exchange

use chrono::Utc;
use crossguard::error::MarketDataError;
use crossguard::models::market::Timeframe;
use crossguard::services::binance::BinanceMarketData;
use crossguard::services::market_data::MarketDataProvider;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn kline(open_ms: i64, close: &str, volume: &str, close_ms: i64) -> serde_json::Value {
    json!([open_ms, "1.0", "2.0", "0.5", close, volume, close_ms, "0", 10, "0", "0", "0"])
}

#[tokio::test]
async fn snapshot_keeps_requested_pairs_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/24hr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"symbol": "BTCUSDT", "lastPrice": "42000.5", "priceChangePercent": "-3.20", "quoteVolume": "1500000.0"},
            {"symbol": "ETHUSDT", "lastPrice": "2500.0", "priceChangePercent": "1.10", "quoteVolume": "800000.0"},
            {"symbol": "BADUSDT", "lastPrice": "n/a", "priceChangePercent": "0", "quoteVolume": "0"},
            {"symbol": "ETHBTC", "lastPrice": "0.05", "priceChangePercent": "0", "quoteVolume": "10"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = BinanceMarketData::new(server.uri());
    let pairs = vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BADUSDT".to_string(),
    ];
    let snapshot = client.fetch_snapshot(&pairs).await.unwrap();

    assert_eq!(snapshot.len(), 2);
    let btc = snapshot["BTCUSDT"];
    assert_eq!(btc.price, 42000.5);
    assert_eq!(btc.change_pct, -3.2);
    assert_eq!(btc.volume, 1_500_000.0);
    assert!(!snapshot.contains_key("ETHBTC"));
}

#[tokio::test]
async fn klines_drop_the_forming_candle() {
    let server = MockServer::start().await;
    let hour_ms = 3_600_000;
    let past = 1_704_067_200_000; // 2024-01-01T00:00:00Z
    let forming_close = Utc::now().timestamp_millis() + hour_ms;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("interval", "1h"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            kline(past, "100.0", "10.0", past + hour_ms - 1),
            kline(past + hour_ms, "101.5", "12.5", past + 2 * hour_ms - 1),
            kline(forming_close - hour_ms, "103.0", "1.0", forming_close),
        ])))
        .mount(&server)
        .await;

    let client = BinanceMarketData::new(server.uri());
    let points = client
        .fetch_detail("BTCUSDT", Timeframe::Hour1, 3)
        .await
        .unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[1].price, 101.5);
    assert_eq!(points[1].volume, 12.5);
    assert_eq!(
        points[0].timestamp.timestamp_millis(),
        past + hour_ms - 1
    );
    assert!(points[0].timestamp < points[1].timestamp);
}

#[tokio::test]
async fn malformed_kline_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[1, "1.0"]])))
        .mount(&server)
        .await;

    let client = BinanceMarketData::new(server.uri());
    let err = client
        .fetch_detail("BTCUSDT", Timeframe::Hour1, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketDataError::Parse(_)));
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/24hr"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = BinanceMarketData::new(server.uri());
    let err = client
        .fetch_snapshot(&["BTCUSDT".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, MarketDataError::Status { status: 429, .. }));
}

#[tokio::test]
async fn discovers_trading_pairs_for_quote_asset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "timezone": "UTC",
            "symbols": [
                {"symbol": "ETHUSDT", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "USDT"},
                {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT"},
                {"symbol": "LUNAUSDT", "status": "BREAK", "baseAsset": "LUNA", "quoteAsset": "USDT"},
                {"symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC"}
            ]
        })))
        .mount(&server)
        .await;

    let client = BinanceMarketData::new(format!("{}/", server.uri()));
    let pairs = client.discover_universe("usdt").await.unwrap();
    assert_eq!(pairs, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
}

#[tokio::test]
async fn discovery_retries_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbols": [
                {"symbol": "BTCUSDT", "status": "TRADING", "quoteAsset": "USDT"}
            ]
        })))
        .mount(&server)
        .await;

    let client = BinanceMarketData::new(server.uri());
    let pairs = client.discover_universe("USDT").await.unwrap();
    assert_eq!(pairs, vec!["BTCUSDT".to_string()]);
}
