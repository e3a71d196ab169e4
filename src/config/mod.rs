//! Engine configuration
//!
//! Read once from the environment at startup (optionally via `.env`) and
//! immutable afterwards. Changing a value requires a restart.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::market::Timeframe;
use crate::scanner::tiers::{TierTable, TierThresholds};

/// Get the current environment (sandbox, production, ...)
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            short_window: 7,
            long_window: 25,
        }
    }
}

/// Classifier thresholds. The defaults come from empirical tuning and are
/// kept adjustable.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub lookback_periods: u64,
    pub death_cross_confidence: f64,
    pub bearish_hold_confidence: f64,
    pub recent_death_hold_confidence: f64,
    pub buy_base_confidence: f64,
    pub trend_strength_scale: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            lookback_periods: 10,
            death_cross_confidence: 1.0,
            bearish_hold_confidence: 0.85,
            recent_death_hold_confidence: 0.85,
            buy_base_confidence: 0.6,
            trend_strength_scale: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub tiers: TierTable,
    pub thresholds: TierThresholds,
    pub surge_threshold: f64,
    /// Weight of the newest snapshot volume in the per-symbol baseline.
    pub volume_baseline_alpha: f64,
    pub timeframe: Timeframe,
    pub detail_limit: usize,
    pub max_calls_per_tick: usize,
    pub worker_pool_size: usize,
    pub snapshot_timeout: Duration,
    pub detail_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tiers: TierTable::new(&["BTCUSDT".to_string(), "ETHUSDT".to_string()], &[]),
            thresholds: TierThresholds::default(),
            surge_threshold: 2.0,
            volume_baseline_alpha: 0.2,
            timeframe: Timeframe::Hour1,
            detail_limit: 100,
            max_calls_per_tick: 40,
            worker_pool_size: 8,
            snapshot_timeout: Duration::from_millis(5000),
            detail_timeout: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub loop_interval: Duration,
    pub order_timeout: Duration,
    /// Quote-currency amount per order; quantity is derived from price.
    pub order_notional: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            loop_interval: Duration::from_secs(30),
            order_timeout: Duration::from_millis(5000),
            order_notional: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub environment: String,
    pub tracker: TrackerConfig,
    pub classifier: ClassifierConfig,
    pub scanner: ScannerConfig,
    pub orchestrator: OrchestratorConfig,
    /// Explicit pair universe; discovered from the exchange when unset.
    pub pairs: Option<Vec<String>>,
    pub quote_asset: String,
    pub binance_api_url: String,
    pub state_path: PathBuf,
    pub event_log_path: Option<PathBuf>,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            tracker: TrackerConfig::default(),
            classifier: ClassifierConfig::default(),
            scanner: ScannerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            pairs: None,
            quote_asset: "USDT".to_string(),
            binance_api_url: "https://api.binance.com".to_string(),
            state_path: PathBuf::from("data/engine-state.json"),
            event_log_path: None,
            port: 8080,
        }
    }
}

impl Config {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup, falling back to defaults for
    /// missing keys, then validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let vars = Vars { lookup: &lookup };

        let timeframe = vars.parse("TIMEFRAME", defaults.scanner.timeframe)?;
        let tier1 = vars
            .list("TIER1_SYMBOLS")
            .unwrap_or_else(|| vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
        let tier2 = vars.list("TIER2_SYMBOLS").unwrap_or_default();

        let config = Config {
            environment: vars
                .string("ENVIRONMENT")
                .unwrap_or(defaults.environment),
            tracker: TrackerConfig {
                short_window: vars.parse("SHORT_WINDOW", defaults.tracker.short_window)?,
                long_window: vars.parse("LONG_WINDOW", defaults.tracker.long_window)?,
            },
            classifier: ClassifierConfig {
                lookback_periods: vars
                    .parse("LOOKBACK_PERIODS", defaults.classifier.lookback_periods)?,
                death_cross_confidence: vars.parse(
                    "DEATH_CROSS_CONFIDENCE",
                    defaults.classifier.death_cross_confidence,
                )?,
                bearish_hold_confidence: vars.parse(
                    "BEARISH_HOLD_CONFIDENCE",
                    defaults.classifier.bearish_hold_confidence,
                )?,
                recent_death_hold_confidence: vars.parse(
                    "RECENT_DEATH_HOLD_CONFIDENCE",
                    defaults.classifier.recent_death_hold_confidence,
                )?,
                buy_base_confidence: vars
                    .parse("BUY_BASE_CONFIDENCE", defaults.classifier.buy_base_confidence)?,
                trend_strength_scale: vars.parse(
                    "TREND_STRENGTH_SCALE",
                    defaults.classifier.trend_strength_scale,
                )?,
            },
            scanner: ScannerConfig {
                tiers: TierTable::new(&tier1, &tier2),
                thresholds: TierThresholds {
                    tier1_change_pct: vars.parse(
                        "TIER1_CHANGE_PCT",
                        defaults.scanner.thresholds.tier1_change_pct,
                    )?,
                    tier2_change_pct: vars.parse(
                        "TIER2_CHANGE_PCT",
                        defaults.scanner.thresholds.tier2_change_pct,
                    )?,
                    tier3_change_pct: vars.parse(
                        "TIER3_CHANGE_PCT",
                        defaults.scanner.thresholds.tier3_change_pct,
                    )?,
                },
                surge_threshold: vars
                    .parse("VOLUME_SURGE_RATIO", defaults.scanner.surge_threshold)?,
                volume_baseline_alpha: vars.parse(
                    "VOLUME_BASELINE_ALPHA",
                    defaults.scanner.volume_baseline_alpha,
                )?,
                timeframe,
                detail_limit: vars.parse("DETAIL_LIMIT", defaults.scanner.detail_limit)?,
                max_calls_per_tick: vars
                    .parse("MAX_CALLS_PER_TICK", defaults.scanner.max_calls_per_tick)?,
                worker_pool_size: vars
                    .parse("WORKER_POOL_SIZE", defaults.scanner.worker_pool_size)?,
                snapshot_timeout: vars.millis("SNAPSHOT_TIMEOUT_MS", defaults.scanner.snapshot_timeout)?,
                detail_timeout: vars.millis("DETAIL_TIMEOUT_MS", defaults.scanner.detail_timeout)?,
            },
            orchestrator: OrchestratorConfig {
                loop_interval: Duration::from_secs(vars.parse(
                    "LOOP_INTERVAL_SECONDS",
                    defaults.orchestrator.loop_interval.as_secs(),
                )?),
                order_timeout: vars.millis("ORDER_TIMEOUT_MS", defaults.orchestrator.order_timeout)?,
                order_notional: vars
                    .parse("ORDER_NOTIONAL", defaults.orchestrator.order_notional)?,
            },
            pairs: vars.list("PAIRS"),
            quote_asset: vars
                .string("QUOTE_ASSET")
                .map(|q| q.to_uppercase())
                .unwrap_or(defaults.quote_asset),
            binance_api_url: vars
                .string("BINANCE_API_URL")
                .unwrap_or(defaults.binance_api_url),
            state_path: vars
                .string("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            event_log_path: vars.string("EVENT_LOG_PATH").map(PathBuf::from),
            port: vars.parse("PORT", defaults.port)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracker.short_window == 0 {
            return Err(invalid("SHORT_WINDOW", "must be greater than 0"));
        }
        if self.tracker.long_window <= self.tracker.short_window {
            return Err(invalid(
                "LONG_WINDOW",
                format!(
                    "must be greater than SHORT_WINDOW ({})",
                    self.tracker.short_window
                ),
            ));
        }
        if self.classifier.lookback_periods == 0 {
            return Err(invalid("LOOKBACK_PERIODS", "must be greater than 0"));
        }
        for (field, value) in [
            ("DEATH_CROSS_CONFIDENCE", self.classifier.death_cross_confidence),
            ("BEARISH_HOLD_CONFIDENCE", self.classifier.bearish_hold_confidence),
            (
                "RECENT_DEATH_HOLD_CONFIDENCE",
                self.classifier.recent_death_hold_confidence,
            ),
            ("BUY_BASE_CONFIDENCE", self.classifier.buy_base_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be within [0, 1]"));
            }
        }
        if !is_positive(self.classifier.trend_strength_scale) {
            return Err(invalid("TREND_STRENGTH_SCALE", "must be positive"));
        }
        let thresholds = &self.scanner.thresholds;
        for (field, value) in [
            ("TIER1_CHANGE_PCT", thresholds.tier1_change_pct),
            ("TIER2_CHANGE_PCT", thresholds.tier2_change_pct),
            ("TIER3_CHANGE_PCT", thresholds.tier3_change_pct),
            ("VOLUME_SURGE_RATIO", self.scanner.surge_threshold),
        ] {
            if !is_positive(value) {
                return Err(invalid(field, "must be positive"));
            }
        }
        if !(0.0..=1.0).contains(&self.scanner.volume_baseline_alpha)
            || self.scanner.volume_baseline_alpha == 0.0
        {
            return Err(invalid("VOLUME_BASELINE_ALPHA", "must be within (0, 1]"));
        }
        if self.scanner.detail_limit <= self.tracker.long_window {
            return Err(invalid(
                "DETAIL_LIMIT",
                format!(
                    "must exceed LONG_WINDOW ({}) so the long EMA can warm up",
                    self.tracker.long_window
                ),
            ));
        }
        if self.scanner.max_calls_per_tick == 0 {
            return Err(invalid("MAX_CALLS_PER_TICK", "must be at least 1"));
        }
        if self.scanner.worker_pool_size == 0 {
            return Err(invalid("WORKER_POOL_SIZE", "must be at least 1"));
        }
        for (field, value) in [
            ("SNAPSHOT_TIMEOUT_MS", self.scanner.snapshot_timeout),
            ("DETAIL_TIMEOUT_MS", self.scanner.detail_timeout),
            ("ORDER_TIMEOUT_MS", self.orchestrator.order_timeout),
        ] {
            if value.is_zero() {
                return Err(invalid(field, "must be greater than 0"));
            }
        }
        if self.orchestrator.loop_interval.is_zero() {
            return Err(invalid("LOOP_INTERVAL_SECONDS", "must be greater than 0"));
        }
        if !is_positive(self.orchestrator.order_notional) {
            return Err(invalid("ORDER_NOTIONAL", "must be positive"));
        }
        if matches!(&self.pairs, Some(pairs) if pairs.is_empty()) {
            return Err(invalid("PAIRS", "must list at least one pair when set"));
        }
        Ok(())
    }
}

/// Finite and above zero. NaN fails.
fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.string(key) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Parse {
                field: key,
                value: raw,
            }),
            None => Ok(default),
        }
    }

    fn millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let ms: u64 = self.parse(key, default.as_millis() as u64)?;
        Ok(Duration::from_millis(ms))
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.string(key).map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}
