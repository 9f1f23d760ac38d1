use std::time::Duration;

/// 2025-08-01T00:00:00Z
pub const DEFAULT_ANCHOR_MS: u64 = 1_754_006_400_000;

pub const MS_PER_HOUR: u64 = 3_600_000;
pub const MS_PER_DAY: u64 = 86_400_000;

/// Tunables for pullback-high signal detection and staging
#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// Pivot low is searched among candles closing at or after this time (epoch ms)
    pub anchor_ms: u64,
    /// Entries older than this many days (by entry candle close) are dropped
    pub entry_window_days: u64,
    /// Max whole hours since entry for a signal to count as fresh
    pub fresh_hours: i64,
    /// % drop from entry at which a short is considered realized
    pub realized_drop_pct: f64,
    /// Slack when checking that a peak is the highest close after the pivot
    pub regional_tolerance: f64,
    /// Fewer candles than this is reported as insufficient data
    pub min_candles: usize,
    /// Upper bound on a single live price lookup
    pub price_timeout: Duration,
    /// When false, current price always comes from the last candle close
    pub use_live_price: bool,
    /// Timeframe label carried into report rows
    pub timeframe: String,
}

impl SignalConfig {
    /// Earliest entry close time still inside the trailing entry window
    pub fn window_start_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entry_window_days * MS_PER_DAY)
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            anchor_ms: DEFAULT_ANCHOR_MS,
            entry_window_days: 30,
            fresh_hours: 24,
            realized_drop_pct: 8.0,
            regional_tolerance: 1e-8,
            min_candles: 5,
            price_timeout: Duration::from_secs(5),
            use_live_price: true,
            timeframe: "4h".to_string(),
        }
    }
}
