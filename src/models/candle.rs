use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Candle {
    /// Candle open time (epoch ms)
    pub open_time: u64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Base asset volume
    pub volume: f64,
    /// Candle close time (epoch ms)
    pub close_time: u64,
}

/// Binance kline as returned by `/api/v3/klines`: a positional array with
/// prices encoded as strings.
#[derive(Debug, Deserialize)]
pub struct RawKline(
    u64,
    String,
    String,
    String,
    String,
    String,
    u64,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

impl TryFrom<RawKline> for Candle {
    type Error = std::num::ParseFloatError;

    fn try_from(raw: RawKline) -> Result<Self, Self::Error> {
        Ok(Candle {
            open_time: raw.0,
            open: raw.1.parse()?,
            high: raw.2.parse()?,
            low: raw.3.parse()?,
            close: raw.4.parse()?,
            volume: raw.5.parse()?,
            close_time: raw.6,
        })
    }
}
