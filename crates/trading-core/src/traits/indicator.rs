//! Indicator trait definitions.

use crate::types::Candle;

/// Indicator output aligned positionally with its input.
///
/// Entries before the warm-up threshold are `None`; there is no other
/// missing-value representation.
pub type IndicatorSeries = Vec<Option<f64>>;

/// Trait for technical indicators over bare prices.
///
/// Prices are taken in the order given; no reordering is applied.
pub trait Indicator: Send + Sync {
    /// Calculate indicator values for the given prices.
    ///
    /// # Returns
    /// A series of the same length as `data`
    fn calculate(&self, data: &[f64]) -> IndicatorSeries;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Check if there's enough data for at least one value.
    fn has_enough_data(&self, len: usize) -> bool {
        self.period() > 0 && len >= self.period()
    }
}

/// Indicator computed from whole candles.
///
/// Implementations accept candles in either chronological direction and
/// return values aligned with the input order.
pub trait CandleIndicator: Send + Sync {
    /// Calculate indicator values for the given candles.
    fn calculate_candles(&self, candles: &[Candle]) -> IndicatorSeries;

    /// Get the minimum candles required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;
}
