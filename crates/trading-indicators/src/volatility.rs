//! Volatility indicators.

use crate::ordering::{with_chronological_order, SeriesOrder};
use trading_core::traits::{CandleIndicator, IndicatorSeries};
use trading_core::types::Candle;

/// Default ATR lookback.
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// Average True Range (ATR).
///
/// Measures market volatility by decomposing the entire range
/// of an asset price for that period. Smoothed with Wilder's method.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
}

impl Atr {
    /// Create a new ATR indicator.
    ///
    /// Common period is 14.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }
}

impl Default for Atr {
    fn default() -> Self {
        Self::new(DEFAULT_ATR_PERIOD)
    }
}

impl CandleIndicator for Atr {
    fn calculate_candles(&self, candles: &[Candle]) -> IndicatorSeries {
        calculate_atr(candles, self.period)
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "ATR"
    }
}

/// ATR expressed as a percentage of the close.
#[derive(Debug, Clone)]
pub struct AtrPercent {
    period: usize,
}

impl AtrPercent {
    /// Create a new ATR% indicator.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }
}

impl Default for AtrPercent {
    fn default() -> Self {
        Self::new(DEFAULT_ATR_PERIOD)
    }
}

impl CandleIndicator for AtrPercent {
    fn calculate_candles(&self, candles: &[Candle]) -> IndicatorSeries {
        calculate_atr_percentage(candles, self.period)
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "ATR%"
    }
}

/// True range of each candle, taking the slice as oldest-first.
///
/// The first candle has no previous close and uses `high - low`.
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    let mut prev_close = None;
    candles
        .iter()
        .map(|candle| {
            let tr = candle.true_range(prev_close);
            prev_close = Some(candle.close);
            tr
        })
        .collect()
}

/// Wilder ATR over candles in either time direction.
///
/// Output is aligned with the input order; the first `period - 1` entries
/// are `None`. Short input or a zero period yields all `None`.
pub fn calculate_atr(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.len() < period {
        return vec![None; candles.len()];
    }

    let order = SeriesOrder::of_candles(candles);
    with_chronological_order(order, candles.to_vec(), |candles| atr_values(candles, period))
}

/// `atr / close * 100` for every defined ATR value.
///
/// A zero close yields `0` rather than dividing.
pub fn calculate_atr_percentage(candles: &[Candle], period: usize) -> IndicatorSeries {
    calculate_atr(candles, period)
        .into_iter()
        .zip(candles)
        .map(|(atr, candle)| {
            atr.map(|atr| {
                if candle.close == 0.0 {
                    0.0
                } else {
                    atr / candle.close * 100.0
                }
            })
        })
        .collect()
}

/// Canonical oldest-first ATR.
fn atr_values(candles: &[Candle], period: usize) -> IndicatorSeries {
    let mut result = vec![None; candles.len()];
    if period == 0 || candles.len() < period {
        return result;
    }

    let tr = true_ranges(candles);
    let period_f64 = period as f64;

    // Initial ATR is SMA of first 'period' true ranges
    let mut atr = tr[..period].iter().sum::<f64>() / period_f64;
    result[period - 1] = Some(atr);

    // Wilder's smoothing
    for (i, &tr_val) in tr.iter().enumerate().skip(period) {
        atr = (atr * (period_f64 - 1.0) + tr_val) / period_f64;
        result[i] = Some(atr);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candles() -> Vec<Candle> {
        vec![
            Candle::new(1_000, 11.0, 12.0, 10.0, 11.0, 100.0),
            Candle::new(2_000, 11.0, 13.0, 11.0, 12.0, 100.0),
            // Gaps up from the previous close of 12
            Candle::new(3_000, 14.0, 16.0, 14.0, 15.0, 100.0),
        ]
    }

    fn trending_candles(len: usize) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.3;
                Candle::new(i as i64 * 60_000, base, base + 1.5, base - 1.2, base + 0.4, 50.0)
            })
            .collect()
    }

    #[test]
    fn test_true_ranges() {
        assert_eq!(true_ranges(&sample_candles()), vec![2.0, 2.0, 4.0]);
        assert!(true_ranges(&[]).is_empty());
    }

    #[test]
    fn test_atr_wilder_smoothing() {
        let result = calculate_atr(&sample_candles(), 2);

        assert_eq!(result[0], None);
        assert!((result[1].unwrap() - 2.0).abs() < 1e-10);
        assert!((result[2].unwrap() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_atr_insufficient_data() {
        let candles = sample_candles();
        assert_eq!(calculate_atr(&candles, 5), vec![None, None, None]);
        assert_eq!(calculate_atr(&candles, 0), vec![None, None, None]);
        assert_eq!(calculate_atr_percentage(&candles, 5), vec![None, None, None]);
    }

    #[test]
    fn test_atr_reversed_candles_give_reversed_result() {
        let candles = trending_candles(30);
        let mut reversed = candles.clone();
        reversed.reverse();

        let forward = calculate_atr(&candles, DEFAULT_ATR_PERIOD);
        let mut backward = Atr::default().calculate_candles(&reversed);
        backward.reverse();

        assert_eq!(forward.iter().filter(|v| v.is_some()).count(), 30 - DEFAULT_ATR_PERIOD + 1);
        for (f, b) in forward.iter().zip(&backward) {
            match (f, b) {
                (Some(f), Some(b)) => assert!((f - b).abs() < 1e-10),
                (None, None) => {}
                _ => panic!("misaligned ATR: {:?} vs {:?}", f, b),
            }
        }
    }

    #[test]
    fn test_atr_percentage_matches_formula() {
        let candles = trending_candles(20);
        let atr = calculate_atr(&candles, 5);
        let pct = AtrPercent::new(5).calculate_candles(&candles);

        for ((atr, pct), candle) in atr.iter().zip(&pct).zip(&candles) {
            match (atr, pct) {
                (Some(atr), Some(pct)) => {
                    assert!((pct - atr / candle.close * 100.0).abs() < 1e-10)
                }
                (None, None) => {}
                _ => panic!("ATR% must be defined exactly where ATR is"),
            }
        }

        let pct = calculate_atr_percentage(&sample_candles(), 2);
        assert!((pct[1].unwrap() - 2.0 / 12.0 * 100.0).abs() < 1e-10);
        assert!((pct[2].unwrap() - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_atr_percentage_zero_close() {
        let mut candles = sample_candles();
        candles[2].close = 0.0;

        let pct = calculate_atr_percentage(&candles, 2);
        assert_eq!(pct[2], Some(0.0));
    }
}
