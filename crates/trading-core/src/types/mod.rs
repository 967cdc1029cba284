//! Core data types for the trading system.

mod candle;
mod decision;
mod market;
mod order;
mod timeframe;

pub use candle::{Candle, PriceSample, PriceSeries, CANDLE_REQUIRED_FIELDS};
pub use decision::{Decision, DecisionAction, InstrumentDecision};
pub use market::{Balance, Position, PositionSide, Ticker};
pub use order::{
    AlgoOrderKind, AmendAlgoRequest, AmendResult, MarginMode, OrderIntent, OrderResult,
    OrderType, ProtectiveLegs, ProtectiveOrder, Side, TriggerPriceType,
};
pub use timeframe::Timeframe;
