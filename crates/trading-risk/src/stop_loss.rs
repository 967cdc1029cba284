//! Stop-loss sanity check for new entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use trading_core::types::Side;

/// Outcome of checking a requested stop-loss against the current price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopLossCheck {
    /// The stop sits on the protective side of the current price.
    Valid,
    /// No usable current price; the stop is trusted as given.
    Unverified,
    /// The stop would trigger immediately.
    Invalid(StopLossViolation),
}

impl StopLossCheck {
    /// The violation, if the check failed.
    pub fn violation(&self) -> Option<&StopLossViolation> {
        match self {
            StopLossCheck::Invalid(violation) => Some(violation),
            _ => None,
        }
    }
}

/// A stop-loss on the wrong side of the market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLossViolation {
    /// Side of the entry order
    pub side: Side,
    pub stop_loss: Decimal,
    pub current_price: Decimal,
}

impl fmt::Display for StopLossViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relation = match self.side {
            Side::Buy => "below",
            Side::Sell => "above",
        };
        write!(
            f,
            "stop-loss {} must be {} the current price {} for a {} entry",
            self.stop_loss, relation, self.current_price, self.side
        )
    }
}

/// Check a stop-loss for an entry on `side`.
///
/// A buy needs `stop_loss < current_price`, a sell needs
/// `stop_loss > current_price`. A missing or non-positive current price skips
/// the check.
pub fn validate_stop_loss(
    side: Side,
    stop_loss: Decimal,
    current_price: Option<Decimal>,
) -> StopLossCheck {
    let current_price = match current_price {
        Some(price) if price > Decimal::ZERO => price,
        _ => return StopLossCheck::Unverified,
    };

    let valid = match side {
        Side::Buy => stop_loss < current_price,   // Long: stop below
        Side::Sell => stop_loss > current_price,  // Short: stop above
    };

    if valid {
        StopLossCheck::Valid
    } else {
        StopLossCheck::Invalid(StopLossViolation {
            side,
            stop_loss,
            current_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_long_stop_below_price_is_valid() {
        assert_eq!(
            validate_stop_loss(Side::Buy, dec!(49500), Some(dec!(50000))),
            StopLossCheck::Valid
        );
    }

    #[test]
    fn test_long_stop_above_price_is_invalid() {
        let check = validate_stop_loss(Side::Buy, dec!(51000), Some(dec!(50000)));

        let violation = check.violation().unwrap();
        assert_eq!(violation.stop_loss, dec!(51000));
        assert_eq!(violation.current_price, dec!(50000));
        assert_eq!(
            violation.to_string(),
            "stop-loss 51000 must be below the current price 50000 for a BUY entry"
        );
    }

    #[test]
    fn test_short_stop_rules() {
        assert_eq!(
            validate_stop_loss(Side::Sell, dec!(50500), Some(dec!(50000))),
            StopLossCheck::Valid
        );

        let check = validate_stop_loss(Side::Sell, dec!(49000), Some(dec!(50000)));
        assert!(matches!(check, StopLossCheck::Invalid(_)));
    }

    #[test]
    fn test_stop_equal_to_price_is_invalid() {
        assert!(validate_stop_loss(Side::Buy, dec!(50000), Some(dec!(50000)))
            .violation()
            .is_some());
        assert!(validate_stop_loss(Side::Sell, dec!(50000), Some(dec!(50000)))
            .violation()
            .is_some());
    }

    #[test]
    fn test_unknown_price_trusts_stop() {
        assert_eq!(validate_stop_loss(Side::Buy, dec!(51000), None), StopLossCheck::Unverified);
        assert_eq!(
            validate_stop_loss(Side::Sell, dec!(1), Some(Decimal::ZERO)),
            StopLossCheck::Unverified
        );
        assert!(StopLossCheck::Unverified.violation().is_none());
    }
}
