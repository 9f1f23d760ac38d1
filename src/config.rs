//! Service configuration loaded from environment variables.
//!
//! Every variable is optional; empty values are treated as unset.
//! - `SCREENER_BIND_ADDR` — HTTP listen address (default `0.0.0.0:3000`)
//! - `SCREENER_SYMBOLS` — comma separated symbols; unset scans all USDT pairs
//! - `SCREENER_MAX_SYMBOLS` — cap on symbols per scan (default 20)
//! - `SCREENER_INTERVAL` — candle interval (default `4h`)
//! - `SCREENER_START_DATE` — pivot anchor date, `YYYY-MM-DD` (default 2025-08-01)
//! - `SCREENER_SCAN_EVERY_SECS` — pause between scans (default 14400)
//! - `SCREENER_REQUEST_DELAY_MS` — pause between kline pages (default 100)
//! - `SCREENER_LIVE_PRICE` — `false` disables live price lookups
//! - `BINANCE_API_KEY` — sent as `X-MBX-APIKEY` when present
//! - `LOG_DIR` — also write daily rolling log files here

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::business_logic::config::SignalConfig;
use crate::models::interval::validate_interval;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Explicit symbol list; empty means discover USDT pairs
    pub symbols: Vec<String>,
    pub max_symbols: usize,
    pub interval: String,
    pub scan_every: Duration,
    pub request_delay: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            max_symbols: 20,
            interval: "4h".to_string(),
            scan_every: Duration::from_secs(4 * 60 * 60),
            request_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub scanner: ScannerConfig,
    pub signal: SignalConfig,
    pub binance_api_key: Option<String>,
    pub log_dir: Option<String>,
}

pub fn fetch_config() -> Result<AppConfig, ConfigError> {
    config_from(|name| std::env::var(name).ok())
}

/// Build the config from an arbitrary variable source
fn config_from<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let mut scanner = ScannerConfig::default();
    let mut signal = SignalConfig::default();

    if let Some(symbols) = var("SCREENER_SYMBOLS") {
        scanner.symbols = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(value) = var("SCREENER_MAX_SYMBOLS") {
        scanner.max_symbols = parse("SCREENER_MAX_SYMBOLS", value)?;
    }
    if let Some(interval) = var("SCREENER_INTERVAL") {
        validate_interval(&interval).map_err(|err| ConfigError::Invalid {
            name: "SCREENER_INTERVAL",
            value: interval.clone(),
            reason: err.to_string(),
        })?;
        signal.timeframe = interval.clone();
        scanner.interval = interval;
    }
    if let Some(value) = var("SCREENER_START_DATE") {
        signal.anchor_ms = parse_anchor(value)?;
    }
    if let Some(value) = var("SCREENER_SCAN_EVERY_SECS") {
        scanner.scan_every = Duration::from_secs(parse_positive("SCREENER_SCAN_EVERY_SECS", value)?);
    }
    if let Some(value) = var("SCREENER_REQUEST_DELAY_MS") {
        scanner.request_delay =
            Duration::from_millis(parse("SCREENER_REQUEST_DELAY_MS", value)?);
    }
    if let Some(value) = var("SCREENER_LIVE_PRICE") {
        signal.use_live_price = parse("SCREENER_LIVE_PRICE", value)?;
    }

    Ok(AppConfig {
        bind_addr: var("SCREENER_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        scanner,
        signal,
        binance_api_key: var("BINANCE_API_KEY"),
        log_dir: var("LOG_DIR"),
    })
}

fn parse<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
        value,
    })
}

/// Zero periods would make the scan ticker panic
fn parse_positive(name: &'static str, value: String) -> Result<u64, ConfigError> {
    match parse::<u64>(name, value.clone())? {
        0 => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        n => Ok(n),
    }
}

fn parse_anchor(value: String) -> Result<u64, ConfigError> {
    let invalid = |reason: String, value: String| ConfigError::Invalid {
        name: "SCREENER_START_DATE",
        value,
        reason,
    };

    let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map_err(|err| invalid(err.to_string(), value.clone()))?;
    let millis = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| invalid("not a valid midnight".to_string(), value.clone()))?;

    u64::try_from(millis).map_err(|_| invalid("before 1970".to_string(), value))
}
