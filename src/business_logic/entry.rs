use async_trait::async_trait;
use serde::Serialize;

use crate::business_logic::analyzer::AnalysisError;
use crate::business_logic::config::SignalConfig;
use crate::business_logic::pullback::PullbackHigh;
use crate::models::candle::Candle;

/// Source of a best-effort live spot price
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn current_price(&self, symbol: &str) -> anyhow::Result<f64>;
}

/// Short entry taken on the close of the candle two bars after a pullback high
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySignal {
    pub ph: PullbackHigh,
    pub entry_price: f64,
    pub entry_timestamp: u64,
    pub current_price: f64,
    /// Negative when price has fallen since entry, i.e. the short is winning
    pub performance_percent: f64,
}

pub fn performance_percent(entry_price: f64, current_price: f64) -> f64 {
    (current_price - entry_price) / entry_price * 100.0
}

/// Build an entry for every pullback high whose entry candle (index + 2)
/// closes inside the trailing entry window.
///
/// A failed, slow or disabled live-price lookup degrades to the last candle
/// close and is only logged.
pub async fn generate_entry_signals<P>(
    candles: &[Candle],
    pullback_highs: &[PullbackHigh],
    symbol: &str,
    prices: &P,
    config: &SignalConfig,
    now_ms: u64,
) -> Result<Vec<EntrySignal>, AnalysisError>
where
    P: PriceLookup + ?Sized,
{
    let Some(last) = candles.last() else {
        return Ok(Vec::new());
    };
    let window_start = config.window_start_ms(now_ms);
    let mut signals = Vec::new();

    for ph in pullback_highs {
        let Some(entry) = candles.get(ph.index + 2) else {
            continue;
        };
        if entry.close_time < window_start {
            continue;
        }
        if !(entry.close.is_finite() && entry.close > 0.0) {
            return Err(AnalysisError::InternalAnalysisFailure(format!(
                "entry candle {} has unusable close {}",
                ph.index + 2,
                entry.close
            )));
        }

        let current_price = resolve_current_price(symbol, prices, config)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!("{}; using last close {}", err, last.close);
                last.close
            });

        signals.push(EntrySignal {
            ph: ph.clone(),
            entry_price: entry.close,
            entry_timestamp: entry.close_time,
            current_price,
            performance_percent: performance_percent(entry.close, current_price),
        });
    }

    Ok(signals)
}

async fn resolve_current_price<P>(
    symbol: &str,
    prices: &P,
    config: &SignalConfig,
) -> Result<f64, AnalysisError>
where
    P: PriceLookup + ?Sized,
{
    let unavailable = |reason: String| AnalysisError::LivePriceUnavailable {
        symbol: symbol.to_string(),
        reason,
    };

    if !config.use_live_price {
        return Err(unavailable("live price disabled".to_string()));
    }

    let price = tokio::time::timeout(config.price_timeout, prices.current_price(symbol))
        .await
        .map_err(|_| unavailable(format!("timed out after {:?}", config.price_timeout)))?
        .map_err(|err| unavailable(err.to_string()))?;

    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(unavailable(format!("invalid price {}", price)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business_logic::config::MS_PER_DAY;
    use crate::business_logic::pullback::RightSideConfirmation;
    use std::time::Duration;

    const STEP_MS: u64 = 14_400_000;

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
            anyhow::bail!("connection refused")
        }
    }

    struct SlowPrice;

    #[async_trait]
    impl PriceLookup for SlowPrice {
        async fn current_price(&self, _symbol: &str) -> anyhow::Result<f64> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1.0)
        }
    }

    fn series(start_ms: u64, closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: start_ms + i as u64 * STEP_MS,
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
                close_time: start_ms + (i as u64 + 1) * STEP_MS - 1,
            })
            .collect()
    }

    fn high_at(candles: &[Candle], index: usize) -> PullbackHigh {
        PullbackHigh {
            index,
            price: candles[index].close,
            timestamp: candles[index].close_time,
            window: candles[index - 2..=index + 2].to_vec(),
            confirmation: RightSideConfirmation::Immediate,
        }
    }

    #[tokio::test]
    async fn entry_uses_candle_two_bars_after_high() {
        let now = 100 * MS_PER_DAY;
        let candles = series(now - 2 * MS_PER_DAY, &[0.5, 1.0, 2.0, 3.0, 2.0, 1.5, 1.2, 1.0]);
        let highs = vec![high_at(&candles, 3)];
        let config = SignalConfig::default();

        let signals = generate_entry_signals(&candles, &highs, "BTCUSDT", &FixedPrice(1.2), &config, now)
            .await
            .unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].entry_timestamp, candles[5].close_time);
        assert_eq!(signals[0].entry_price, 1.5);
        assert_eq!(signals[0].current_price, 1.2);
        assert!((signals[0].performance_percent - -20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn entries_outside_window_are_skipped() {
        let now = 100 * MS_PER_DAY;
        let candles = series(now - 40 * MS_PER_DAY, &[0.5, 1.0, 2.0, 3.0, 2.0, 1.5, 1.2, 1.0]);
        let highs = vec![high_at(&candles, 3)];
        let config = SignalConfig::default();

        let signals = generate_entry_signals(&candles, &highs, "BTCUSDT", &FixedPrice(1.2), &config, now)
            .await
            .unwrap();

        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn failed_lookup_falls_back_to_last_close() {
        let now = 100 * MS_PER_DAY;
        let candles = series(now - 2 * MS_PER_DAY, &[0.5, 1.0, 2.0, 3.0, 2.0, 1.5, 1.2, 1.0]);
        let highs = vec![high_at(&candles, 3)];
        let config = SignalConfig::default();

        let signals = generate_entry_signals(&candles, &highs, "BTCUSDT", &FailingPrice, &config, now)
            .await
            .unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].current_price, 1.0);
    }

    #[tokio::test]
    async fn slow_lookup_is_time_bounded() {
        let now = 100 * MS_PER_DAY;
        let candles = series(now - 2 * MS_PER_DAY, &[0.5, 1.0, 2.0, 3.0, 2.0, 1.5, 1.2, 1.0]);
        let highs = vec![high_at(&candles, 3)];
        let config = SignalConfig {
            price_timeout: Duration::from_millis(50),
            ..SignalConfig::default()
        };

        let signals = generate_entry_signals(&candles, &highs, "BTCUSDT", &SlowPrice, &config, now)
            .await
            .unwrap();

        assert_eq!(signals[0].current_price, 1.0);
    }

    #[tokio::test]
    async fn disabled_live_price_uses_last_close() {
        let now = 100 * MS_PER_DAY;
        let candles = series(now - 2 * MS_PER_DAY, &[0.5, 1.0, 2.0, 3.0, 2.0, 1.5, 1.2, 1.0]);
        let highs = vec![high_at(&candles, 3)];
        let config = SignalConfig {
            use_live_price: false,
            ..SignalConfig::default()
        };

        let signals = generate_entry_signals(&candles, &highs, "BTCUSDT", &FixedPrice(9.0), &config, now)
            .await
            .unwrap();

        assert_eq!(signals[0].current_price, 1.0);
    }

    #[tokio::test]
    async fn zero_entry_close_is_an_internal_failure() {
        let now = 100 * MS_PER_DAY;
        let candles = series(now - 2 * MS_PER_DAY, &[0.5, 1.0, 2.0, 3.0, 2.0, 0.0, 1.2, 1.0]);
        let highs = vec![high_at(&candles, 3)];
        let config = SignalConfig::default();

        let err = generate_entry_signals(&candles, &highs, "BTCUSDT", &FixedPrice(1.0), &config, now)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::InternalAnalysisFailure(_)));
    }

    #[test]
    fn performance_is_negative_when_price_falls() {
        assert!((performance_percent(100.0, 92.0) - -8.0).abs() < 1e-12);
        assert!((performance_percent(100.0, 105.0) - 5.0).abs() < 1e-12);
    }
}
