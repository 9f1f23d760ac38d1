use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{interval, MissedTickBehavior};

use crate::business_logic::analyzer::{AnalysisResult, SignalAnalyzer};
use crate::business_logic::entry::PriceLookup;
use crate::config::ScannerConfig;
use crate::models::candle::Candle;
use crate::models::signal::{signal_rows, symbol_status, ScanSnapshot, SignalView, SymbolStatus};
use crate::services::binance::BinanceClient;
use crate::services::scan_state::SharedScanState;

/// Market data needed by a scan
#[async_trait]
pub trait CandleSource: PriceLookup {
    /// Closed candles from `start_ms` up to now, ascending by close time
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: u64,
    ) -> anyhow::Result<Vec<Candle>>;

    /// Symbols to scan when none are configured
    async fn list_symbols(&self) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: u64,
    ) -> anyhow::Result<Vec<Candle>> {
        self.fetch_historical(symbol, interval, start_ms).await
    }

    async fn list_symbols(&self) -> anyhow::Result<Vec<String>> {
        self.fetch_usdt_pairs().await
    }
}

/// Batch scanner: analyzes every symbol in turn and publishes the report
pub struct ScannerService<S> {
    source: Arc<S>,
    analyzer: SignalAnalyzer,
    config: ScannerConfig,
    shared_state: SharedScanState,
}

impl<S: CandleSource> ScannerService<S> {
    pub fn new(
        source: Arc<S>,
        analyzer: SignalAnalyzer,
        config: ScannerConfig,
        shared_state: SharedScanState,
    ) -> Self {
        Self {
            source,
            analyzer,
            config,
            shared_state,
        }
    }

    /// Scan on a fixed period, forever
    pub async fn run(&self) {
        let mut ticker = interval(self.config.scan_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.scan_once().await {
                Ok(snapshot) => {
                    tracing::info!(
                        "Scan complete: {} symbols, {} signals",
                        snapshot.symbols_scanned,
                        snapshot.signals.len()
                    );
                    self.shared_state.publish(snapshot).await;
                }
                Err(e) => tracing::error!("Scan failed: {}", e),
            }
        }
    }

    /// One full pass over the symbol list. Only symbol discovery can fail the
    /// pass; per-symbol failures are recorded in the snapshot.
    pub async fn scan_once(&self) -> anyhow::Result<ScanSnapshot> {
        let symbols = self.resolve_symbols().await?;
        tracing::info!("Analyzing {} symbols...", symbols.len());

        let mut signals: Vec<SignalView> = Vec::new();
        let mut statuses: Vec<SymbolStatus> = Vec::new();

        for (n, symbol) in symbols.iter().enumerate() {
            tracing::info!("Processing {}... ({}/{})", symbol, n + 1, symbols.len());

            match self.scan_symbol(symbol).await {
                Ok(result) => {
                    log_result(&result);
                    signals.extend(signal_rows(&result, &self.analyzer.config().timeframe));
                    statuses.push(symbol_status(&result));
                }
                Err(e) => {
                    tracing::error!("Error processing {}: {:#}", symbol, e);
                    statuses.push(SymbolStatus {
                        symbol: symbol.clone(),
                        pivot_low_price: None,
                        pivot_low_ts: None,
                        pullback_highs: 0,
                        counts: Default::default(),
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        sort_newest_first(&mut signals);

        Ok(ScanSnapshot {
            as_of_ms: chrono::Utc::now().timestamp_millis() as u64,
            symbols_scanned: symbols.len(),
            signals,
            statuses,
        })
    }

    async fn scan_symbol(&self, symbol: &str) -> anyhow::Result<AnalysisResult> {
        let candles = self
            .source
            .fetch_candles(symbol, &self.config.interval, self.analyzer.config().anchor_ms)
            .await?;

        Ok(self
            .analyzer
            .analyze_symbol(symbol, &candles, self.source.as_ref())
            .await)
    }

    async fn resolve_symbols(&self) -> anyhow::Result<Vec<String>> {
        let mut symbols = if self.config.symbols.is_empty() {
            self.source.list_symbols().await?
        } else {
            self.config.symbols.clone()
        };
        symbols.truncate(self.config.max_symbols);
        Ok(symbols)
    }
}

fn sort_newest_first(signals: &mut [SignalView]) {
    signals.sort_by(|a, b| b.signal_time_ms.cmp(&a.signal_time_ms));
}

fn log_result(result: &AnalysisResult) {
    match (&result.error, result.signals.len()) {
        (Some(error), _) => {
            tracing::info!("No signals found for {} ({})", result.symbol, error)
        }
        (None, 0) => tracing::info!("No signals found for {}", result.symbol),
        (None, n) => tracing::info!(
            "Found {} signal(s) for {} (upcoming {}, fresh {}, active {}, realized {})",
            n,
            result.symbol,
            result.summary.upcoming,
            result.summary.fresh,
            result.summary.active,
            result.summary.realized
        ),
    }
}
