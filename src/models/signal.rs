use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::business_logic::analyzer::AnalysisResult;
use crate::business_logic::stage::{ClassifiedSignal, SignalDetail, StageSummary};
use crate::models::interval::validate_interval;

/// One report row per classified signal
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SignalView {
    pub symbol: String,
    pub timeframe: String,
    /// upcoming, fresh, active or realized
    pub stage: String,
    pub description: String,
    pub pl_ts: String,
    pub ph_close: f64,
    pub ph_ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right1_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right1_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_close_needed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<String>,
    /// Entry close time, or Right-1 close time for upcoming signals (epoch ms)
    pub signal_time_ms: u64,
}

/// Per-symbol outcome of a batch scan
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SymbolStatus {
    pub symbol: String,
    pub pivot_low_price: Option<f64>,
    pub pivot_low_ts: Option<String>,
    pub pullback_highs: usize,
    pub counts: StageSummary,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ScanSnapshot {
    pub as_of_ms: u64,
    pub symbols_scanned: usize,
    /// Newest signal first
    pub signals: Vec<SignalView>,
    pub statuses: Vec<SymbolStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignalsResponse {
    pub scanned: bool,
    pub snapshot: ScanSnapshot,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PullbackHighView {
    pub index: usize,
    pub price: f64,
    pub ts: String,
    pub confirmation: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalysisResponse {
    pub symbol: String,
    pub interval: String,
    pub candles: usize,
    pub pivot_low_price: Option<f64>,
    pub pivot_low_ts: Option<String>,
    pub pullback_highs: Vec<PullbackHighView>,
    pub signals: Vec<SignalView>,
    pub counts: StageSummary,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema, IntoParams)]
pub struct AnalyzeQuery {
    #[validate(length(min = 1, max = 24))]
    #[param(example = "BTCUSDT")]
    pub symbol: String,
    /// Candle interval, defaults to the scanner interval
    #[validate(custom(function = "validate_interval"))]
    #[param(example = "4h")]
    pub interval: Option<String>,
}

/// UTC `YYYY-MM-DD HH:MM:SS`
pub fn format_ts(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Render every classified signal of a result as report rows, in stage order
pub fn signal_rows(result: &AnalysisResult, timeframe: &str) -> Vec<SignalView> {
    let Some(pivot) = &result.pivot_low else {
        return Vec::new();
    };
    let pl_ts = format_ts(pivot.timestamp);

    result
        .signals
        .iter()
        .map(|signal| signal_row(&result.symbol, timeframe, &pl_ts, signal))
        .collect()
}

fn signal_row(symbol: &str, timeframe: &str, pl_ts: &str, signal: &ClassifiedSignal) -> SignalView {
    let mut view = SignalView {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        stage: signal.stage.into(),
        description: signal.description.clone(),
        pl_ts: pl_ts.to_string(),
        ph_close: 0.0,
        ph_ts: String::new(),
        right1_price: None,
        right1_ts: None,
        next_close_needed: None,
        entry_price: None,
        entry_ts: None,
        current_price: None,
        performance: None,
        signal_time_ms: 0,
    };

    match &signal.detail {
        SignalDetail::Right1(right1) => {
            view.ph_close = right1.price;
            view.ph_ts = format_ts(right1.timestamp);
            view.right1_price = Some(right1.right1_price);
            view.right1_ts = Some(format_ts(right1.right1_timestamp));
            view.next_close_needed = Some("For signal confirmation".to_string());
            view.signal_time_ms = right1.right1_timestamp;
        }
        SignalDetail::Entry(entry) => {
            view.ph_close = entry.ph.price;
            view.ph_ts = format_ts(entry.ph.timestamp);
            view.entry_price = Some(entry.entry_price);
            view.entry_ts = Some(format_ts(entry.entry_timestamp));
            view.current_price = Some(entry.current_price);
            view.performance = Some(format!("{:.2}%", entry.performance_percent));
            view.signal_time_ms = entry.entry_timestamp;
        }
    }

    view
}

pub fn symbol_status(result: &AnalysisResult) -> SymbolStatus {
    SymbolStatus {
        symbol: result.symbol.clone(),
        pivot_low_price: result.pivot_low.as_ref().map(|p| p.price),
        pivot_low_ts: result.pivot_low.as_ref().map(|p| format_ts(p.timestamp)),
        pullback_highs: result.pullback_highs.as_ref().map_or(0, Vec::len),
        counts: result.summary,
        error: result.error.as_ref().map(ToString::to_string),
    }
}

pub fn analysis_response(result: &AnalysisResult, interval: &str, candles: usize) -> AnalysisResponse {
    let status = symbol_status(result);
    let pullback_highs = result
        .pullback_highs
        .iter()
        .flatten()
        .map(|ph| PullbackHighView {
            index: ph.index,
            price: ph.price,
            ts: format_ts(ph.timestamp),
            confirmation: format!("{:?}", ph.confirmation),
        })
        .collect();

    AnalysisResponse {
        symbol: status.symbol,
        interval: interval.to_string(),
        candles,
        pivot_low_price: status.pivot_low_price,
        pivot_low_ts: status.pivot_low_ts,
        pullback_highs,
        signals: signal_rows(result, interval),
        counts: status.counts,
        error: status.error,
    }
}
