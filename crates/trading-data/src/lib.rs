//! File-backed data sources.
//!
//! - Candles from CSV, kept in file order
//! - Decisions from JSON lines, one `{instrument, action, ...}` object per line,
//!   replayable per instrument through [`DecisionQueue`]

mod csv_source;
mod decisions;

pub use csv_source::CsvDataSource;
pub use decisions::{load_decisions, parse_decisions, DecisionQueue};

use std::path::Path;
use trading_core::error::DataError;
use trading_core::types::Candle;

/// Load candles from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>, DataError> {
    CsvDataSource::new(path)?.load()
}
