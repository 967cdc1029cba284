//! Error types for the trading system.

use thiserror::Error;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Malformed input: {0}")]
    MalformedInput(#[from] MalformedInputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exchange gateway errors.
///
/// Any transport or exchange-level failure surfaces as one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Structurally invalid input rejected at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedInputError {
    #[error("Candle needs at least {required} fields, got {found}")]
    MissingFields { required: usize, found: usize },

    #[error("Invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Invalid decision: {0}")]
    Decision(String),
}

/// Errors raised while turning a decision into exchange calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    #[error("No worker for instrument {0}")]
    UnknownInstrument(String),

    #[error("Worker for {0} has stopped")]
    WorkerClosed(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Data source errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("No data available at {0}")]
    NoDataAvailable(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Malformed record at line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: MalformedInputError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_converts_into_dispatch_error() {
        let err: DispatchError = GatewayError::Timeout("ticker".to_string()).into();
        assert_eq!(err, DispatchError::Gateway(GatewayError::Timeout("ticker".to_string())));
        assert_eq!(err.to_string(), "Timed out: ticker");
    }

    #[test]
    fn test_malformed_candle_message() {
        let err = MalformedInputError::MissingFields { required: 6, found: 4 };
        assert_eq!(err.to_string(), "Candle needs at least 6 fields, got 4");

        let top: TradingError = err.into();
        assert!(matches!(top, TradingError::MalformedInput(_)));
    }
}
