//! Unit tests for configuration loading

use crossguard::config::Config;
use crossguard::error::ConfigError;
use crossguard::models::market::{Tier, Timeframe};
use std::collections::HashMap;
use std::time::Duration;

fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| map.get(key).cloned())
}

#[test]
fn empty_environment_gives_defaults() {
    let config = load(&[]).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.tracker.short_window, 7);
    assert_eq!(config.tracker.long_window, 25);
    assert_eq!(config.classifier.lookback_periods, 10);
    assert_eq!(config.orchestrator.loop_interval, Duration::from_secs(30));
    assert_eq!(config.scanner.worker_pool_size, 8);
    assert!(config.pairs.is_none());
    assert_eq!(config.scanner.tiers.tier_of("BTCUSDT"), Tier::Tier1);
}

#[test]
fn overrides_are_parsed() {
    let config = load(&[
        ("SHORT_WINDOW", "5"),
        ("LONG_WINDOW", "20"),
        ("TIMEFRAME", "15m"),
        ("PAIRS", "btcusdt, solusdt ,"),
        ("TIER2_SYMBOLS", "solusdt"),
        ("DETAIL_TIMEOUT_MS", "750"),
        ("LOOP_INTERVAL_SECONDS", "10"),
        ("EVENT_LOG_PATH", "data/events.jsonl"),
    ])
    .unwrap();

    assert_eq!(config.tracker.short_window, 5);
    assert_eq!(config.scanner.timeframe, Timeframe::Minute15);
    assert_eq!(
        config.pairs,
        Some(vec!["BTCUSDT".to_string(), "SOLUSDT".to_string()])
    );
    assert_eq!(config.scanner.tiers.tier_of("SOLUSDT"), Tier::Tier2);
    assert_eq!(config.scanner.detail_timeout, Duration::from_millis(750));
    assert_eq!(config.orchestrator.loop_interval, Duration::from_secs(10));
    assert!(config.event_log_path.is_some());
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let config = load(&[("SHORT_WINDOW", "  "), ("PORT", "")]).unwrap();
    assert_eq!(config.tracker.short_window, 7);
    assert_eq!(config.port, 8080);
}

#[test]
fn unparsable_value_is_rejected() {
    let err = load(&[("LONG_WINDOW", "twenty")]).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Parse {
            field: "LONG_WINDOW",
            value: "twenty".to_string()
        }
    );
    assert!(load(&[("TIMEFRAME", "2h")]).is_err());
}

#[test]
fn invalid_values_are_rejected() {
    let cases: &[(&[(&str, &str)], &str)] = &[
        (&[("SHORT_WINDOW", "0")], "SHORT_WINDOW"),
        (&[("SHORT_WINDOW", "30")], "LONG_WINDOW"),
        (&[("LOOKBACK_PERIODS", "0")], "LOOKBACK_PERIODS"),
        (&[("BUY_BASE_CONFIDENCE", "1.5")], "BUY_BASE_CONFIDENCE"),
        (&[("TIER3_CHANGE_PCT", "0")], "TIER3_CHANGE_PCT"),
        (&[("TIER1_CHANGE_PCT", "NaN")], "TIER1_CHANGE_PCT"),
        (&[("VOLUME_SURGE_RATIO", "inf")], "VOLUME_SURGE_RATIO"),
        (&[("TREND_STRENGTH_SCALE", "NaN")], "TREND_STRENGTH_SCALE"),
        (&[("BEARISH_HOLD_CONFIDENCE", "NaN")], "BEARISH_HOLD_CONFIDENCE"),
        (&[("DETAIL_LIMIT", "20")], "DETAIL_LIMIT"),
        (&[("MAX_CALLS_PER_TICK", "0")], "MAX_CALLS_PER_TICK"),
        (&[("WORKER_POOL_SIZE", "0")], "WORKER_POOL_SIZE"),
        (&[("ORDER_TIMEOUT_MS", "0")], "ORDER_TIMEOUT_MS"),
        (&[("LOOP_INTERVAL_SECONDS", "0")], "LOOP_INTERVAL_SECONDS"),
        (&[("ORDER_NOTIONAL", "-1")], "ORDER_NOTIONAL"),
        (&[("ORDER_NOTIONAL", "NaN")], "ORDER_NOTIONAL"),
        (&[("PAIRS", " , ")], "PAIRS"),
    ];

    for (vars, expected_field) in cases {
        match load(vars) {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, *expected_field, "vars {:?}", vars)
            }
            other => panic!("expected invalid {}, got {:?}", expected_field, other),
        }
    }
}

#[test]
fn production_environments_use_json_logs() {
    assert!(crossguard::logging::is_production("production"));
    assert!(crossguard::logging::is_production("prod"));
    assert!(!crossguard::logging::is_production("sandbox"));
}

#[test]
fn config_errors_surface_unchanged_at_startup() {
    let err: crossguard::Error = load(&[("SHORT_WINDOW", "0")]).unwrap_err().into();
    assert!(matches!(err, crossguard::Error::Config(_)));
    assert_eq!(
        err.to_string(),
        "invalid value for SHORT_WINDOW: must be greater than 0"
    );
}
