use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::business_logic::config::SignalConfig;
use crate::business_logic::entry::{generate_entry_signals, PriceLookup};
use crate::business_logic::pivot::{find_pivot_low, PivotLow};
use crate::business_logic::pullback::{find_pullback_highs, find_right1_signal, PullbackHigh};
use crate::business_logic::stage::{
    categorize_signals, CategorizedSignals, ClassifiedSignal, StageSummary,
};
use crate::models::candle::Candle;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AnalysisError {
    #[error("Insufficient data: {found} candles, need at least {required}")]
    InsufficientData { found: usize, required: usize },
    #[error("No pivot low found")]
    NoPivotLow,
    #[error("Live price unavailable for {symbol}: {reason}")]
    LivePriceUnavailable { symbol: String, reason: String },
    #[error("Analysis failed: {0}")]
    InternalAnalysisFailure(String),
}

/// Outcome of analyzing one symbol. Failures are carried in `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub pivot_low: Option<PivotLow>,
    pub pullback_highs: Option<Vec<PullbackHigh>>,
    /// Upcoming, then fresh, active, realized
    pub signals: Vec<ClassifiedSignal>,
    pub categorized: CategorizedSignals,
    pub summary: StageSummary,
    pub error: Option<AnalysisError>,
}

impl AnalysisResult {
    fn failed(symbol: &str, pivot_low: Option<PivotLow>, error: AnalysisError) -> Self {
        Self {
            symbol: symbol.to_string(),
            pivot_low,
            pullback_highs: None,
            signals: Vec::new(),
            categorized: CategorizedSignals::default(),
            summary: StageSummary::default(),
            error: Some(error),
        }
    }
}

/// Pullback-high pattern engine
#[derive(Debug, Clone, Default)]
pub struct SignalAnalyzer {
    config: SignalConfig,
}

impl SignalAnalyzer {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub async fn analyze_symbol<P>(&self, symbol: &str, candles: &[Candle], prices: &P) -> AnalysisResult
    where
        P: PriceLookup + ?Sized,
    {
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        self.analyze_symbol_at(symbol, candles, prices, now_ms).await
    }

    /// Analyze against an explicit evaluation time (epoch ms)
    pub async fn analyze_symbol_at<P>(
        &self,
        symbol: &str,
        candles: &[Candle],
        prices: &P,
        now_ms: u64,
    ) -> AnalysisResult
    where
        P: PriceLookup + ?Sized,
    {
        let span = tracing::debug_span!("analyze", symbol);
        self.run(symbol, candles, prices, now_ms)
            .instrument(span)
            .await
    }

    async fn run<P>(&self, symbol: &str, candles: &[Candle], prices: &P, now_ms: u64) -> AnalysisResult
    where
        P: PriceLookup + ?Sized,
    {
        if candles.len() < self.config.min_candles {
            return AnalysisResult::failed(
                symbol,
                None,
                AnalysisError::InsufficientData {
                    found: candles.len(),
                    required: self.config.min_candles,
                },
            );
        }

        if let Err(error) = validate_candles(candles) {
            return AnalysisResult::failed(symbol, None, error);
        }

        let Some(pivot_low) = find_pivot_low(candles, self.config.anchor_ms) else {
            return AnalysisResult::failed(symbol, None, AnalysisError::NoPivotLow);
        };

        let tolerance = self.config.regional_tolerance;
        let pullback_highs = find_pullback_highs(candles, &pivot_low, tolerance);

        let entries = match generate_entry_signals(
            candles,
            &pullback_highs,
            symbol,
            prices,
            &self.config,
            now_ms,
        )
        .await
        {
            Ok(entries) => entries,
            Err(error) => return AnalysisResult::failed(symbol, Some(pivot_low), error),
        };

        let right1 = find_right1_signal(
            candles,
            &pivot_low,
            self.config.window_start_ms(now_ms),
            tolerance,
        );

        tracing::debug!(
            pivot_index = pivot_low.index,
            pivot_price = pivot_low.price,
            pullback_highs = pullback_highs.len(),
            entries = entries.len(),
            right1 = right1.is_some(),
            candles = candles.len(),
            "pattern scan complete"
        );

        let categorized = categorize_signals(entries, right1, &self.config, now_ms);

        AnalysisResult {
            symbol: symbol.to_string(),
            pivot_low: Some(pivot_low),
            pullback_highs: Some(pullback_highs),
            signals: categorized.ordered(),
            summary: categorized.summary(),
            categorized,
            error: None,
        }
    }
}

/// Prices must be finite and close times strictly increasing
fn validate_candles(candles: &[Candle]) -> Result<(), AnalysisError> {
    for (index, candle) in candles.iter().enumerate() {
        let prices = [candle.open, candle.high, candle.low, candle.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(AnalysisError::InternalAnalysisFailure(format!(
                "candle {} has a non-finite price",
                index
            )));
        }
    }

    if let Some(index) = candles
        .windows(2)
        .position(|pair| pair[1].close_time <= pair[0].close_time)
    {
        return Err(AnalysisError::InternalAnalysisFailure(format!(
            "close times not strictly increasing at candle {}",
            index + 1
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business_logic::config::{MS_PER_DAY, MS_PER_HOUR};
    use crate::business_logic::stage::{SignalDetail, Stage};
    use async_trait::async_trait;

    const STEP_MS: u64 = 4 * MS_PER_HOUR;

    struct FixedPrice(f64);

    #[async_trait]
    impl PriceLookup for FixedPrice {
        async fn current_price(&self, _symbol: &str) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    struct FailingPrice;

    #[async_trait]
    impl PriceLookup for FailingPrice {
        async fn current_price(&self, _symbol: &str) -> anyhow::Result<f64> {
            anyhow::bail!("ticker endpoint unreachable")
        }
    }

    fn series(start_ms: u64, closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: start_ms + i as u64 * STEP_MS,
                open: close,
                high: close + 0.05,
                low: close - 0.05,
                close,
                volume: 1.0,
                close_time: start_ms + (i as u64 + 1) * STEP_MS - 1,
            })
            .collect()
    }

    fn analyzer(anchor_ms: u64) -> SignalAnalyzer {
        SignalAnalyzer::new(SignalConfig {
            anchor_ms,
            ..SignalConfig::default()
        })
    }

    #[tokio::test]
    async fn fewer_than_five_candles_is_insufficient() {
        let candles = series(0, &[1.0, 2.0, 3.0, 2.0]);
        let result = analyzer(0)
            .analyze_symbol_at("BTCUSDT", &candles, &FailingPrice, MS_PER_DAY)
            .await;

        assert_eq!(
            result.error,
            Some(AnalysisError::InsufficientData {
                found: 4,
                required: 5
            })
        );
        assert!(result.signals.is_empty());
        assert!(result.pivot_low.is_none());
    }

    #[tokio::test]
    async fn no_candle_after_anchor_reports_no_pivot() {
        let candles = series(0, &[1.0, 2.0, 3.0, 2.0, 1.0]);
        let result = analyzer(10 * MS_PER_DAY)
            .analyze_symbol_at("BTCUSDT", &candles, &FailingPrice, 11 * MS_PER_DAY)
            .await;

        assert_eq!(result.error, Some(AnalysisError::NoPivotLow));
        assert!(result.pullback_highs.is_none());
    }

    #[tokio::test]
    async fn unordered_candles_are_an_internal_failure() {
        let mut candles = series(0, &[1.0, 2.0, 3.0, 2.0, 1.0]);
        candles.swap(1, 2);
        let result = analyzer(0)
            .analyze_symbol_at("BTCUSDT", &candles, &FailingPrice, MS_PER_DAY)
            .await;

        assert!(matches!(
            result.error,
            Some(AnalysisError::InternalAnalysisFailure(_))
        ));
    }

    #[tokio::test]
    async fn confirmed_pullback_high_becomes_fresh_entry() {
        let start = 100 * MS_PER_DAY;
        let closes = [0.5, 1.0, 2.0, 3.0, 2.0, 2.5, 1.9, 1.0, 0.8];
        let candles = series(start, &closes);
        let now = candles.last().unwrap().close_time + 1;

        let result = analyzer(start)
            .analyze_symbol_at("ETHUSDT", &candles, &FixedPrice(2.45), now)
            .await;

        assert_eq!(result.error, None);
        assert_eq!(result.pivot_low.as_ref().unwrap().index, 0);

        let highs = result.pullback_highs.as_ref().unwrap();
        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].index, 3);

        assert_eq!(result.summary.fresh, 1);
        assert_eq!(result.summary.total, 1);
        let SignalDetail::Entry(entry) = &result.signals[0].detail else {
            panic!("expected an entry signal");
        };
        assert_eq!(entry.entry_timestamp, candles[5].close_time);
        assert_eq!(entry.entry_price, 2.5);
        assert!((entry.performance_percent - -2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_price_lookup_is_not_reported_as_error() {
        let start = 100 * MS_PER_DAY;
        let closes = [0.5, 1.0, 2.0, 3.0, 2.0, 2.5, 1.9, 1.0, 0.8];
        let candles = series(start, &closes);
        let now = candles.last().unwrap().close_time + 1;

        let result = analyzer(start)
            .analyze_symbol_at("ETHUSDT", &candles, &FailingPrice, now)
            .await;

        assert_eq!(result.error, None);
        assert_eq!(result.summary.total, 1);
        let SignalDetail::Entry(entry) = &result.signals[0].detail else {
            panic!("expected an entry signal");
        };
        assert_eq!(entry.entry_price, 2.5);
        assert_eq!(entry.current_price, 0.8);
        assert!((entry.performance_percent - -68.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn large_drop_is_realized_and_lower_right1_is_ignored() {
        let start = 100 * MS_PER_DAY;
        // The Right-1 shape at the tail peaks at 2.9, below the earlier 3.0
        let closes = [0.5, 1.0, 2.0, 3.0, 2.0, 1.5, 1.2, 1.0, 0.8, 0.9, 1.1, 2.9, 2.0];
        let candles = series(start, &closes);
        let now = candles.last().unwrap().close_time + 1;

        let result = analyzer(start)
            .analyze_symbol_at("SOLUSDT", &candles, &FixedPrice(1.2), now)
            .await;

        assert_eq!(result.error, None);
        assert_eq!(result.summary.upcoming, 0);
        assert_eq!(result.summary.realized, 1);

        let stages: Vec<Stage> = result.signals.iter().map(|s| s.stage).collect();
        assert_eq!(stages, vec![Stage::Realized]);
    }

    #[tokio::test]
    async fn right1_candidate_is_reported_as_upcoming() {
        let start = 100 * MS_PER_DAY;
        let closes = [0.5, 0.8, 1.0, 2.0, 3.0, 2.5];
        let candles = series(start, &closes);
        let now = candles.last().unwrap().close_time + 1;

        let result = analyzer(start)
            .analyze_symbol_at("BNBUSDT", &candles, &FailingPrice, now)
            .await;

        assert_eq!(result.error, None);
        assert_eq!(result.summary.upcoming, 1);
        assert_eq!(result.signals[0].stage, Stage::Upcoming);
        let SignalDetail::Right1(signal) = &result.signals[0].detail else {
            panic!("expected a right-1 signal");
        };
        assert_eq!(signal.index, 4);
        assert_eq!(signal.right1_price, 2.5);
    }

    #[tokio::test]
    async fn old_entries_are_active_after_fresh_window() {
        let start = 100 * MS_PER_DAY;
        let closes = [0.5, 1.0, 2.0, 3.0, 2.0, 1.5, 1.2, 1.0, 0.8];
        let candles = series(start, &closes);
        let now = candles[5].close_time + 3 * MS_PER_DAY;

        let result = analyzer(start)
            .analyze_symbol_at("XRPUSDT", &candles, &FixedPrice(1.45), now)
            .await;

        assert_eq!(result.summary.active, 1);
        assert_eq!(result.categorized.active.len(), 1);
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_results() {
        let start = 100 * MS_PER_DAY;
        let closes = [0.5, 1.0, 2.0, 3.0, 2.0, 2.5, 2.2, 1.5, 1.0];
        let candles = series(start, &closes);
        let now = candles.last().unwrap().close_time + MS_PER_HOUR;
        let engine = analyzer(start);

        let first = engine
            .analyze_symbol_at("ADAUSDT", &candles, &FixedPrice(1.4), now)
            .await;
        let second = engine
            .analyze_symbol_at("ADAUSDT", &candles, &FixedPrice(1.4), now)
            .await;

        assert_eq!(first, second);
    }
}
