use std::sync::Arc;

use crate::business_logic::analyzer::SignalAnalyzer;
use crate::services::binance::BinanceClient;
use crate::services::scan_state::SharedScanState;

#[derive(Clone)]
pub struct AppState {
    pub scan_state: SharedScanState,
    pub binance: Arc<BinanceClient>,
    pub analyzer: Arc<SignalAnalyzer>,
    /// Default interval for on-demand analysis
    pub interval: String,
}
