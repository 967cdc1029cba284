//! Core types and traits for the trading system.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Candle, PriceSample, Ticker)
//! - Trading decisions and the order intents derived from them
//! - Protective (algo) order types read back from the exchange
//! - Core traits for indicators, the exchange gateway and decision sources

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    DataError, DispatchError, GatewayError, MalformedInputError, TradingError, TradingResult,
};
pub use traits::*;
pub use types::*;
