use serde::Serialize;

use crate::models::candle::Candle;

/// Lowest low at or after the anchor time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotLow {
    pub index: usize,
    pub price: f64,
    pub timestamp: u64,
}

/// Locate the pivot low among candles closing at or after `anchor_ms`.
///
/// On exact ties the later candle wins: a candle replaces the running
/// minimum when its low is less than *or equal to* it. Returns `None` when
/// no candle closes at or after the anchor.
pub fn find_pivot_low(candles: &[Candle], anchor_ms: u64) -> Option<PivotLow> {
    let mut pivot: Option<PivotLow> = None;

    for (index, candle) in candles.iter().enumerate() {
        if candle.close_time < anchor_ms {
            continue;
        }

        let replaces = pivot.as_ref().map_or(true, |p| candle.low <= p.price);
        if replaces {
            pivot = Some(PivotLow {
                index,
                price: candle.low,
                timestamp: candle.close_time,
            });
        }
    }

    pivot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle_with_low(close_time: u64, low: f64) -> Candle {
        Candle {
            open_time: close_time.saturating_sub(10),
            open: low + 1.0,
            high: low + 2.0,
            low,
            close: low + 1.0,
            volume: 0.0,
            close_time,
        }
    }

    #[test]
    fn picks_minimum_low() {
        let candles: Vec<Candle> = [5.0, 3.0, 4.0, 6.0]
            .iter()
            .enumerate()
            .map(|(i, &low)| candle_with_low(100 + i as u64 * 10, low))
            .collect();

        let pivot = find_pivot_low(&candles, 0).unwrap();
        assert_eq!(pivot.index, 1);
        assert_eq!(pivot.price, 3.0);
        assert_eq!(pivot.timestamp, 110);
    }

    #[test]
    fn ties_resolve_to_later_candle() {
        let candles: Vec<Candle> = [5.0, 3.0, 4.0, 3.0, 6.0]
            .iter()
            .enumerate()
            .map(|(i, &low)| candle_with_low(100 + i as u64 * 10, low))
            .collect();

        let pivot = find_pivot_low(&candles, 0).unwrap();
        assert_eq!(pivot.index, 3);
    }

    #[test]
    fn ignores_candles_before_anchor() {
        let candles = vec![
            candle_with_low(100, 1.0),
            candle_with_low(200, 4.0),
            candle_with_low(300, 2.0),
        ];

        let pivot = find_pivot_low(&candles, 200).unwrap();
        assert_eq!(pivot.index, 2);
        assert!(candles[pivot.index].close_time >= 200);
    }

    #[test]
    fn anchor_is_inclusive() {
        let candles = vec![candle_with_low(100, 9.0), candle_with_low(200, 7.0)];
        let pivot = find_pivot_low(&candles, 100).unwrap();
        assert_eq!(pivot.index, 1);

        let only_at_anchor = vec![candle_with_low(100, 9.0)];
        assert_eq!(find_pivot_low(&only_at_anchor, 100).unwrap().index, 0);
    }

    #[test]
    fn none_when_everything_precedes_anchor() {
        let candles = vec![candle_with_low(100, 1.0), candle_with_low(200, 2.0)];
        assert!(find_pivot_low(&candles, 201).is_none());
        assert!(find_pivot_low(&[], 0).is_none());
    }
}
