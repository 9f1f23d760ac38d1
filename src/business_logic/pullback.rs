use serde::Serialize;

use crate::business_logic::pivot::PivotLow;
use crate::models::candle::Candle;

/// How the right side of a five-bar peak confirmed the reversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RightSideConfirmation {
    /// C[i+2] < C[i+1]
    Immediate,
    /// Right-2 bounced, C[i+3] < C[i+1]
    OneBarTolerance,
    /// Right-2 and Right-3 bounced, C[i+4] < C[i+2]
    TwoBarTolerance,
}

/// Confirmed pullback high
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullbackHigh {
    pub index: usize,
    pub price: f64,
    pub timestamp: u64,
    /// Candles i-2..=i+2
    pub window: Vec<Candle>,
    pub confirmation: RightSideConfirmation,
}

/// Pullback high candidate whose Right-1 is the latest candle, pending Right-2
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Right1Signal {
    pub index: usize,
    pub price: f64,
    pub timestamp: u64,
    /// Candles i-2..=i+1
    pub window: Vec<Candle>,
    pub right1_price: f64,
    pub right1_timestamp: u64,
}

/// C[i-2] < C[i-1] < C[i] and C[i+1] < C[i]
fn left_up_right1_down(candles: &[Candle], center: usize) -> bool {
    if center < 2 || center + 1 >= candles.len() {
        return false;
    }

    let c = |i: usize| candles[i].close;
    c(center - 2) < c(center - 1) && c(center - 1) < c(center) && c(center + 1) < c(center)
}

/// Five-bar peak test centred on `center`, including the containment
/// fallback when Right-2 bounces. Look-ahead bars that do not exist fail
/// their rule.
pub fn match_five_bar(candles: &[Candle], center: usize) -> Option<RightSideConfirmation> {
    if !left_up_right1_down(candles, center) {
        return None;
    }

    let close_at = |offset: usize| candles.get(center + offset).map(|k| k.close);
    let right1 = close_at(1)?;
    let right2 = close_at(2)?;

    if right2 < right1 {
        return Some(RightSideConfirmation::Immediate);
    }
    if close_at(3).is_some_and(|right3| right3 < right1) {
        return Some(RightSideConfirmation::OneBarTolerance);
    }
    if close_at(4).is_some_and(|right4| right4 < right2) {
        return Some(RightSideConfirmation::TwoBarTolerance);
    }

    None
}

/// No close after the pivot exceeds `price` by more than `tolerance`
pub fn is_regional_high(candles: &[Candle], pivot_index: usize, price: f64, tolerance: f64) -> bool {
    candles
        .iter()
        .skip(pivot_index + 1)
        .all(|candle| candle.close <= price + tolerance)
}

/// Scan for a strictly descending staircase of pullback highs after the pivot.
///
/// Centres run from `pivot + 3` while four bars of look-ahead remain, so the
/// containment fallback always has the bars it needs. A candidate that is
/// not strictly below the last accepted high is dropped.
pub fn find_pullback_highs(
    candles: &[Candle],
    pivot: &PivotLow,
    tolerance: f64,
) -> Vec<PullbackHigh> {
    let mut highs: Vec<PullbackHigh> = Vec::new();
    let first = pivot.index + 3;
    let end = candles.len().saturating_sub(4);

    for center in first..end {
        let Some(confirmation) = match_five_bar(candles, center) else {
            continue;
        };

        let price = candles[center].close;
        if !is_regional_high(candles, pivot.index, price, tolerance) {
            continue;
        }

        let lower_than_last = highs.last().map_or(true, |last| price < last.price);
        if !lower_than_last {
            tracing::debug!(center, price, "peak not below previous pullback high, dropped");
            continue;
        }

        trace_accepted(candles, center, confirmation);
        highs.push(PullbackHigh {
            index: center,
            price,
            timestamp: candles[center].close_time,
            window: candles[center - 2..=center + 2].to_vec(),
            confirmation,
        });
    }

    highs
}

/// Check only the newest possible centre (`len - 2`) with the latest candle as
/// Right-1. The Right-1 candle must close at or after `window_start_ms`.
pub fn find_right1_signal(
    candles: &[Candle],
    pivot: &PivotLow,
    window_start_ms: u64,
    tolerance: f64,
) -> Option<Right1Signal> {
    let center = candles.len().checked_sub(2)?;
    if center < pivot.index + 3 || !left_up_right1_down(candles, center) {
        return None;
    }

    let right1 = &candles[center + 1];
    if right1.close_time < window_start_ms {
        return None;
    }

    let price = candles[center].close;
    if !is_regional_high(candles, pivot.index, price, tolerance) {
        return None;
    }

    Some(Right1Signal {
        index: center,
        price,
        timestamp: candles[center].close_time,
        window: candles[center - 2..=center + 1].to_vec(),
        right1_price: right1.close,
        right1_timestamp: right1.close_time,
    })
}

fn trace_accepted(candles: &[Candle], center: usize, confirmation: RightSideConfirmation) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let end = (center + 5).min(candles.len());
    let closes: Vec<String> = candles[center - 2..end]
        .iter()
        .map(|c| format!("{:.6}", c.close))
        .collect();

    tracing::debug!(
        center,
        price = candles[center].close,
        ?confirmation,
        "pullback high accepted, closes i-2..i+4: [{}]",
        closes.join(", ")
    );
}
