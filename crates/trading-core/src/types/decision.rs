//! Trading decisions produced by the upstream decision source.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MalformedInputError;

/// What the decision source wants done on an instrument.
///
/// Unrecognized actions are preserved rather than rejected so they can be
/// logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DecisionAction {
    EntryLong,
    EntryShort,
    ExitLong,
    ExitShort,
    UpdateStopLoss,
    NoOp,
    Unknown(String),
}

impl DecisionAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &str {
        match self {
            DecisionAction::EntryLong => "ENTRY_LONG",
            DecisionAction::EntryShort => "ENTRY_SHORT",
            DecisionAction::ExitLong => "EXIT_LONG",
            DecisionAction::ExitShort => "EXIT_SHORT",
            DecisionAction::UpdateStopLoss => "UPDATE_STOP_LOSS",
            DecisionAction::NoOp => "NO_OP",
            DecisionAction::Unknown(raw) => raw,
        }
    }

    /// Check if the action opens a position.
    pub fn is_entry(&self) -> bool {
        matches!(self, DecisionAction::EntryLong | DecisionAction::EntryShort)
    }
}

/// Only the exact upper-case names are recognized; anything else, including
/// other casings or padded names, is kept as [`DecisionAction::Unknown`].
impl From<String> for DecisionAction {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "ENTRY_LONG" => DecisionAction::EntryLong,
            "ENTRY_SHORT" => DecisionAction::EntryShort,
            "EXIT_LONG" => DecisionAction::ExitLong,
            "EXIT_SHORT" => DecisionAction::ExitShort,
            "UPDATE_STOP_LOSS" => DecisionAction::UpdateStopLoss,
            "NO_OP" => DecisionAction::NoOp,
            _ => DecisionAction::Unknown(raw),
        }
    }
}

impl From<&str> for DecisionAction {
    fn from(raw: &str) -> Self {
        DecisionAction::from(raw.to_string())
    }
}

impl From<DecisionAction> for String {
    fn from(action: DecisionAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trading decision for one instrument.
///
/// Comes from outside the process and is never trusted: quantities and
/// prices are re-checked by the dispatcher before any order is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, alias = "stopLoss", skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, alias = "takeProfit", skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// Free-text rationale from the decision source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Decision {
    /// Create a decision with only an action.
    pub fn new(action: impl Into<DecisionAction>) -> Self {
        Self {
            action: action.into(),
            quantity: None,
            stop_loss: None,
            take_profit: None,
            reason: None,
        }
    }

    pub fn entry_long(quantity: Decimal) -> Self {
        Self::new(DecisionAction::EntryLong).with_quantity(quantity)
    }

    pub fn entry_short(quantity: Decimal) -> Self {
        Self::new(DecisionAction::EntryShort).with_quantity(quantity)
    }

    pub fn update_stop_loss(stop_loss: Decimal) -> Self {
        Self::new(DecisionAction::UpdateStopLoss).with_stop_loss(stop_loss)
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_stop_loss(mut self, stop_loss: Decimal) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_take_profit(mut self, take_profit: Decimal) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Parse a decision from the decision source's JSON output.
    pub fn from_json(raw: &str) -> Result<Self, MalformedInputError> {
        serde_json::from_str(raw).map_err(|e| MalformedInputError::Decision(e.to_string()))
    }

    /// Quantity, when present and strictly positive.
    pub fn valid_quantity(&self) -> Option<Decimal> {
        self.quantity.filter(|q| *q > Decimal::ZERO)
    }

    /// Stop-loss price, when present and strictly positive.
    pub fn valid_stop_loss(&self) -> Option<Decimal> {
        self.stop_loss.filter(|p| *p > Decimal::ZERO)
    }

    /// Take-profit price, when present and strictly positive.
    pub fn valid_take_profit(&self) -> Option<Decimal> {
        self.take_profit.filter(|p| *p > Decimal::ZERO)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        if let Some(q) = self.quantity {
            write!(f, " qty={}", q)?;
        }
        if let Some(sl) = self.stop_loss {
            write!(f, " sl={}", sl)?;
        }
        if let Some(tp) = self.take_profit {
            write!(f, " tp={}", tp)?;
        }
        Ok(())
    }
}

/// A decision addressed to a specific instrument, as read from a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentDecision {
    #[serde(alias = "symbol", alias = "instId")]
    pub instrument: String,
    #[serde(flatten)]
    pub decision: Decision,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decision_from_json_snake_case() {
        let raw = r#"{"action":"ENTRY_LONG","quantity":0.01,"stop_loss":49500,"reason":"breakout"}"#;
        let decision = Decision::from_json(raw).unwrap();

        assert_eq!(decision.action, DecisionAction::EntryLong);
        assert_eq!(decision.quantity, Some(dec!(0.01)));
        assert_eq!(decision.stop_loss, Some(dec!(49500)));
        assert_eq!(decision.reason.as_deref(), Some("breakout"));
    }

    #[test]
    fn test_decision_from_json_camel_case_and_strings() {
        let raw = r#"{"action":"ENTRY_SHORT","quantity":"2","stopLoss":"51000","takeProfit":"47000"}"#;
        let decision = Decision::from_json(raw).unwrap();

        assert_eq!(decision.action, DecisionAction::EntryShort);
        assert_eq!(decision.quantity, Some(dec!(2)));
        assert_eq!(decision.stop_loss, Some(dec!(51000)));
        assert_eq!(decision.take_profit, Some(dec!(47000)));
    }

    #[test]
    fn test_unknown_action_is_preserved() {
        let decision = Decision::from_json(r#"{"action":"PYRAMID"}"#).unwrap();
        assert_eq!(decision.action, DecisionAction::Unknown("PYRAMID".to_string()));
        assert_eq!(decision.action.to_string(), "PYRAMID");
    }

    #[test]
    fn test_action_names_are_case_sensitive() {
        for raw in ["entry_long", " EXIT_SHORT ", "Exit_Short", "no_op"] {
            assert_eq!(
                DecisionAction::from(raw),
                DecisionAction::Unknown(raw.to_string())
            );
        }
        assert_eq!(DecisionAction::from("EXIT_SHORT"), DecisionAction::ExitShort);
    }

    #[test]
    fn test_malformed_decision_is_rejected() {
        let err = Decision::from_json(r#"{"quantity":1}"#).unwrap_err();
        assert!(matches!(err, MalformedInputError::Decision(_)));

        let err = Decision::from_json(r#"{"action":"NO_OP","quantity":"lots"}"#).unwrap_err();
        assert!(matches!(err, MalformedInputError::Decision(_)));
    }

    #[test]
    fn test_non_positive_values_are_not_valid() {
        let decision = Decision::entry_long(dec!(0)).with_stop_loss(dec!(-1));
        assert_eq!(decision.valid_quantity(), None);
        assert_eq!(decision.valid_stop_loss(), None);

        let decision = Decision::entry_long(dec!(0.5)).with_stop_loss(dec!(100));
        assert_eq!(decision.valid_quantity(), Some(dec!(0.5)));
        assert_eq!(decision.valid_stop_loss(), Some(dec!(100)));
    }

    #[test]
    fn test_instrument_decision_flattened() {
        let raw = r#"{"instrument":"BTC-USDT-SWAP","action":"EXIT_LONG"}"#;
        let parsed: InstrumentDecision = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.instrument, "BTC-USDT-SWAP");
        assert_eq!(parsed.decision.action, DecisionAction::ExitLong);
    }
}
