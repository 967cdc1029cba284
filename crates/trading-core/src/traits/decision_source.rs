//! Decision source trait definition.

use crate::error::TradingError;
use crate::types::{Candle, Decision};
use async_trait::async_trait;

/// Market state handed to a decision source once per cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub instrument: String,
    /// Candles in the order the gateway returned them
    pub candles: Vec<Candle>,
    /// EMA at the newest candle
    pub ema: Option<f64>,
    /// ATR at the newest candle
    pub atr: Option<f64>,
    /// ATR as a percentage of the newest close
    pub atr_pct: Option<f64>,
}

impl MarketSnapshot {
    /// The newest candle, whichever direction the series runs.
    pub fn latest(&self) -> Option<&Candle> {
        match (self.candles.first(), self.candles.last()) {
            (Some(first), Some(last)) if first.timestamp > last.timestamp => Some(first),
            (_, last) => last,
        }
    }
}

/// Produces the decision for one instrument.
///
/// Called once per cycle per instrument, never concurrently for the same
/// instrument.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Decide on the next action, or `None` to sit the cycle out.
    async fn decide(&self, snapshot: &MarketSnapshot) -> Result<Option<Decision>, TradingError>;

    /// Get the source name.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(timestamps: &[i64]) -> MarketSnapshot {
        MarketSnapshot {
            instrument: "BTC-USDT-SWAP".to_string(),
            candles: timestamps
                .iter()
                .map(|&ts| Candle::new(ts, 1.0, 1.0, 1.0, ts as f64, 1.0))
                .collect(),
            ema: None,
            atr: None,
            atr_pct: None,
        }
    }

    #[test]
    fn test_latest_candle_either_direction() {
        assert_eq!(snapshot(&[1, 2, 3]).latest().map(|c| c.timestamp), Some(3));
        assert_eq!(snapshot(&[3, 2, 1]).latest().map(|c| c.timestamp), Some(3));
        assert_eq!(snapshot(&[7]).latest().map(|c| c.timestamp), Some(7));
        assert!(snapshot(&[]).latest().is_none());
    }
}
