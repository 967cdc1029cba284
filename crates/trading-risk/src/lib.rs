//! Risk checks for the decision pipeline.
//!
//! Validates a requested stop-loss against the market before it is attached
//! to an entry order. A failing check never blocks the entry; the caller
//! drops the protective leg and logs the violation.

mod stop_loss;

pub use stop_loss::{validate_stop_loss, StopLossCheck, StopLossViolation};
