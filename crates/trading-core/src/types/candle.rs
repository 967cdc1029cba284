//! Candle and price-sample types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MalformedInputError;

/// Fields every raw candle must carry: timestamp, open, high, low, close, volume.
pub const CANDLE_REQUIRED_FIELDS: usize = 6;

/// OHLCV candle.
/// Uses f64 for fast indicator calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Unix timestamp in milliseconds (candle open time)
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Trading volume (contracts)
    pub volume: f64,
    /// Whether the candle is closed; an in-progress candle is unconfirmed
    #[serde(default = "confirmed_default")]
    pub confirmed: bool,
}

fn confirmed_default() -> bool {
    true
}

impl Candle {
    /// Create a new confirmed candle.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            confirmed: true,
        }
    }

    /// Mark the candle as still forming.
    pub fn unconfirmed(mut self) -> Self {
        self.confirmed = false;
        self
    }

    /// Build a candle from the exchange's positional string array:
    /// `[ts, o, h, l, c, vol, volCcy?, volCcyQuote?, confirm?]`.
    ///
    /// Fails with [`MalformedInputError`] when fewer than the six required
    /// fields are present or a required field is not numeric.
    pub fn from_raw<S: AsRef<str>>(fields: &[S]) -> Result<Self, MalformedInputError> {
        if fields.len() < CANDLE_REQUIRED_FIELDS {
            return Err(MalformedInputError::MissingFields {
                required: CANDLE_REQUIRED_FIELDS,
                found: fields.len(),
            });
        }

        let timestamp = fields[0]
            .as_ref()
            .trim()
            .parse::<i64>()
            .map_err(|_| MalformedInputError::InvalidField {
                field: "timestamp",
                value: fields[0].as_ref().to_string(),
            })?;

        let number = |idx: usize, field: &'static str| -> Result<f64, MalformedInputError> {
            let raw = fields[idx].as_ref();
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| MalformedInputError::InvalidField {
                    field,
                    value: raw.to_string(),
                })
        };

        let confirmed = fields
            .get(8)
            .map(|flag| flag.as_ref().trim() != "0")
            .unwrap_or(true);

        Ok(Self {
            timestamp,
            open: number(1, "open")?,
            high: number(2, "high")?,
            low: number(3, "low")?,
            close: number(4, "close")?,
            volume: number(5, "volume")?,
            confirmed,
        })
    }

    /// Calculate the candle's range (high - low).
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Calculate the true range (used for ATR).
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => {
                let hl = self.high - self.low;
                let hc = (self.high - pc).abs();
                let lc = (self.low - pc).abs();
                hl.max(hc).max(lc)
            }
            None => self.range(),
        }
    }
}

impl std::fmt::Display for Candle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.datetime() {
            Some(dt) => write!(f, "Candle[{}]", dt.to_rfc3339())?,
            None => write!(f, "Candle[{}]", self.timestamp)?,
        }
        write!(
            f,
            ": O={}, H={}, L={}, C={}, Vol={}",
            self.open, self.high, self.low, self.close, self.volume
        )
    }
}

/// A single input point for price indicators: a bare price or a full candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceSample {
    Price(f64),
    Candle(Candle),
}

impl PriceSample {
    /// The price used by close-based indicators.
    pub fn price(&self) -> f64 {
        match self {
            PriceSample::Price(p) => *p,
            PriceSample::Candle(c) => c.close,
        }
    }

    /// Timestamp, when the sample is a candle.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            PriceSample::Price(_) => None,
            PriceSample::Candle(c) => Some(c.timestamp),
        }
    }
}

impl From<f64> for PriceSample {
    fn from(price: f64) -> Self {
        PriceSample::Price(price)
    }
}

impl From<Candle> for PriceSample {
    fn from(candle: Candle) -> Self {
        PriceSample::Candle(candle)
    }
}

/// Borrowed view over an ordered price series.
#[derive(Debug, Clone, Copy)]
pub enum PriceSeries<'a> {
    /// Bare prices, taken in the caller's order.
    Prices(&'a [f64]),
    /// Candles; the close price is used.
    Candles(&'a [Candle]),
    /// Mixed samples.
    Samples(&'a [PriceSample]),
}

impl<'a> PriceSeries<'a> {
    /// Number of points in the series.
    pub fn len(&self) -> usize {
        match self {
            PriceSeries::Prices(p) => p.len(),
            PriceSeries::Candles(c) => c.len(),
            PriceSeries::Samples(s) => s.len(),
        }
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prices in series order.
    pub fn prices(&self) -> Vec<f64> {
        match self {
            PriceSeries::Prices(p) => p.to_vec(),
            PriceSeries::Candles(c) => c.iter().map(|c| c.close).collect(),
            PriceSeries::Samples(s) => s.iter().map(PriceSample::price).collect(),
        }
    }

    /// Timestamps of the first and last points, when both are candles.
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        match self {
            PriceSeries::Prices(_) => None,
            PriceSeries::Candles(c) => Some((c.first()?.timestamp, c.last()?.timestamp)),
            PriceSeries::Samples(s) => Some((s.first()?.timestamp()?, s.last()?.timestamp()?)),
        }
    }
}

impl<'a> From<&'a [f64]> for PriceSeries<'a> {
    fn from(prices: &'a [f64]) -> Self {
        PriceSeries::Prices(prices)
    }
}

impl<'a> From<&'a Vec<f64>> for PriceSeries<'a> {
    fn from(prices: &'a Vec<f64>) -> Self {
        PriceSeries::Prices(prices)
    }
}

impl<'a> From<&'a [Candle]> for PriceSeries<'a> {
    fn from(candles: &'a [Candle]) -> Self {
        PriceSeries::Candles(candles)
    }
}

impl<'a> From<&'a Vec<Candle>> for PriceSeries<'a> {
    fn from(candles: &'a Vec<Candle>) -> Self {
        PriceSeries::Candles(candles)
    }
}

impl<'a> From<&'a [PriceSample]> for PriceSeries<'a> {
    fn from(samples: &'a [PriceSample]) -> Self {
        PriceSeries::Samples(samples)
    }
}

impl<'a> From<&'a Vec<PriceSample>> for PriceSeries<'a> {
    fn from(samples: &'a Vec<PriceSample>) -> Self {
        PriceSeries::Samples(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candle_true_range() {
        let candle = Candle::new(1000, 100.0, 110.0, 95.0, 105.0, 1000000.0);

        // Without previous close
        assert!((candle.true_range(None) - 15.0).abs() < 0.001);

        // With previous close that creates gap
        assert!((candle.true_range(Some(90.0)) - 20.0).abs() < 0.001);
        assert!((candle.true_range(Some(120.0)) - 25.0).abs() < 0.001);
    }

    #[test]
    fn test_candle_from_raw_exchange_row() {
        let row = [
            "1700000000000", "35000.1", "35100", "34900.5", "35050", "120", "0.12", "4200", "0",
        ];
        let candle = Candle::from_raw(&row).unwrap();

        assert_eq!(candle.timestamp, 1_700_000_000_000);
        assert_eq!(candle.close, 35050.0);
        assert_eq!(candle.volume, 120.0);
        assert!(!candle.confirmed);
    }

    #[test]
    fn test_candle_from_raw_minimal_row_is_confirmed() {
        let candle = Candle::from_raw(&["1", "1", "2", "0.5", "1.5", "10"]).unwrap();
        assert!(candle.confirmed);
        assert_eq!(candle.range(), 1.5);
    }

    #[test]
    fn test_candle_from_raw_rejects_short_row() {
        let err = Candle::from_raw(&["1", "1", "2", "0.5"]).unwrap_err();
        assert_eq!(err, MalformedInputError::MissingFields { required: 6, found: 4 });
    }

    #[test]
    fn test_candle_from_raw_rejects_non_numeric() {
        let err = Candle::from_raw(&["1", "1", "abc", "0.5", "1.5", "10"]).unwrap_err();
        assert!(matches!(err, MalformedInputError::InvalidField { field: "high", .. }));
    }

    #[test]
    fn test_price_series_time_bounds() {
        let candles = vec![
            Candle::new(3, 1.0, 1.0, 1.0, 1.0, 0.0),
            Candle::new(1, 1.0, 1.0, 1.0, 2.0, 0.0),
        ];
        let series = PriceSeries::from(&candles);
        assert_eq!(series.time_bounds(), Some((3, 1)));
        assert_eq!(series.prices(), vec![1.0, 2.0]);

        let prices = vec![1.0, 2.0];
        assert_eq!(PriceSeries::from(&prices).time_bounds(), None);

        let mixed = vec![PriceSample::from(candles[0]), PriceSample::from(5.0)];
        assert_eq!(PriceSeries::from(&mixed).time_bounds(), None);
    }
}
