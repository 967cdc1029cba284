//! Moving average indicators.

use crate::ordering::{with_chronological_order, SeriesOrder};
use trading_core::traits::{CandleIndicator, Indicator, IndicatorSeries};
use trading_core::types::{Candle, PriceSeries};

/// Default EMA lookback.
pub const DEFAULT_EMA_PERIOD: usize = 20;

/// Exponential Moving Average (EMA).
///
/// Seeded with the SMA of the first `period` prices, then gives more weight
/// to recent prices using an exponential decay with `k = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
}

impl Ema {
    /// Create a new EMA with the specified period.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        let multiplier = 2.0 / (period as f64 + 1.0);
        Self { period, multiplier }
    }

    /// Smoothing factor applied to each new price.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for Ema {
    fn default() -> Self {
        Self::new(DEFAULT_EMA_PERIOD)
    }
}

impl Indicator for Ema {
    fn calculate(&self, data: &[f64]) -> IndicatorSeries {
        ema_values(data, self.period)
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

impl CandleIndicator for Ema {
    fn calculate_candles(&self, candles: &[Candle]) -> IndicatorSeries {
        calculate_ema(candles, self.period)
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

/// EMA over prices, candles (close) or mixed samples.
///
/// Candle series given newest-first are computed oldest-first and returned
/// in the caller's order. A series shorter than `period`, or a zero period,
/// yields all `None`.
pub fn calculate_ema<'a>(series: impl Into<PriceSeries<'a>>, period: usize) -> IndicatorSeries {
    let series = series.into();
    if period == 0 || series.len() < period {
        return vec![None; series.len()];
    }

    let order = SeriesOrder::of_series(&series);
    with_chronological_order(order, series.prices(), |prices| ema_values(prices, period))
}

/// EMA with the default 20-period lookback.
pub fn calculate_ema20<'a>(series: impl Into<PriceSeries<'a>>) -> IndicatorSeries {
    calculate_ema(series, DEFAULT_EMA_PERIOD)
}

/// Canonical oldest-first EMA.
fn ema_values(data: &[f64], period: usize) -> IndicatorSeries {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let one_minus_mult = 1.0 - multiplier;

    // Initialize with SMA
    let mut ema = data[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(ema);

    for (i, &price) in data.iter().enumerate().skip(period) {
        ema = price * multiplier + ema * one_minus_mult;
        result[i] = Some(ema);
    }

    result
}
