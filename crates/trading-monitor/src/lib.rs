//! Logging setup for the trader binary.

mod logging;

pub use logging::{setup_logging, LOG_FILE_PREFIX};
