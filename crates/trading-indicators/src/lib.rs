//! Technical indicators.
//!
//! This crate provides the indicators the decision pipeline consumes:
//! - Exponential moving average (EMA, with an EMA20 shorthand)
//! - Average True Range (Wilder smoothing) and ATR as a percentage of close
//!
//! Every function returns a series the same length as its input, with `None`
//! during warm-up. Candle series may be given newest-first or oldest-first;
//! results always line up with the caller's order.

pub mod moving_average;
pub mod ordering;
pub mod volatility;

pub use moving_average::{calculate_ema, calculate_ema20, Ema, DEFAULT_EMA_PERIOD};
pub use ordering::SeriesOrder;
pub use volatility::{
    calculate_atr, calculate_atr_percentage, true_ranges, Atr, AtrPercent, DEFAULT_ATR_PERIOD,
};
