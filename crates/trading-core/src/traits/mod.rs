//! Core traits for the trading system.

mod decision_source;
mod gateway;
mod indicator;

pub use decision_source::{DecisionSource, MarketSnapshot};
pub use gateway::ExchangeGateway;
pub use indicator::{CandleIndicator, Indicator, IndicatorSeries};
