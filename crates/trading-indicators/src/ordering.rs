//! Chronological normalization.
//!
//! Exchanges hand candles back newest-first while files are usually
//! oldest-first. Every indicator here is written once against oldest-first
//! data; [`with_chronological_order`] wraps it so callers get results in
//! whatever order they passed in.

use trading_core::traits::IndicatorSeries;
use trading_core::types::{Candle, PriceSeries};

/// Time direction of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

impl SeriesOrder {
    /// Direction implied by the first and last timestamps.
    pub fn from_bounds(first: i64, last: i64) -> Self {
        if first > last {
            SeriesOrder::NewestFirst
        } else {
            SeriesOrder::OldestFirst
        }
    }

    /// Direction of a candle slice.
    pub fn of_candles(candles: &[Candle]) -> Self {
        match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => Self::from_bounds(first.timestamp, last.timestamp),
            _ => SeriesOrder::OldestFirst,
        }
    }

    /// Direction of a price series.
    ///
    /// Bare prices carry no timestamps and are taken as given.
    pub fn of_series(series: &PriceSeries<'_>) -> Self {
        series
            .time_bounds()
            .map(|(first, last)| Self::from_bounds(first, last))
            .unwrap_or_default()
    }

    /// Reorder `values` between this direction and oldest-first.
    ///
    /// Reversal is its own inverse, so the same call normalizes input and
    /// restores output.
    pub fn apply<T>(self, mut values: Vec<T>) -> Vec<T> {
        if self == SeriesOrder::NewestFirst {
            values.reverse();
        }
        values
    }
}

/// Run an oldest-first computation over `values` given in `order`, returning
/// its output in `order` again.
pub fn with_chronological_order<T, F>(order: SeriesOrder, values: Vec<T>, compute: F) -> IndicatorSeries
where
    F: FnOnce(&[T]) -> IndicatorSeries,
{
    let chronological = order.apply(values);
    order.apply(compute(&chronological))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64) -> Candle {
        Candle::new(ts, 1.0, 1.0, 1.0, 1.0, 0.0)
    }

    #[test]
    fn test_detect_order() {
        assert_eq!(SeriesOrder::of_candles(&[candle(1), candle(2)]), SeriesOrder::OldestFirst);
        assert_eq!(SeriesOrder::of_candles(&[candle(2), candle(1)]), SeriesOrder::NewestFirst);
        assert_eq!(SeriesOrder::of_candles(&[candle(5)]), SeriesOrder::OldestFirst);
        assert_eq!(SeriesOrder::of_candles(&[]), SeriesOrder::OldestFirst);

        let prices = [3.0, 2.0, 1.0];
        assert_eq!(
            SeriesOrder::of_series(&PriceSeries::from(&prices[..])),
            SeriesOrder::OldestFirst
        );
    }

    #[test]
    fn test_wrapper_sees_oldest_first_and_restores_order() {
        let result = with_chronological_order(SeriesOrder::NewestFirst, vec![3.0, 2.0, 1.0], |data| {
            assert_eq!(data, &[1.0, 2.0, 3.0]);
            vec![None, Some(10.0), Some(20.0)]
        });

        assert_eq!(result, vec![Some(20.0), Some(10.0), None]);
    }
}
