//! Turns decisions into exchange calls.
//!
//! [`plan_decision`] is the pure mapping from a decision to what should
//! happen; [`DecisionDispatcher`] fetches what the plan needs from the
//! exchange, carries it out and logs each step.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use trading_core::error::DispatchError;
use trading_core::traits::ExchangeGateway;
use trading_core::types::{
    Decision, DecisionAction, OrderIntent, OrderResult, ProtectiveLegs, Side,
};
use trading_risk::{validate_stop_loss, StopLossViolation};

use crate::reconciler::{StopLossReconciler, StopLossUpdate};

/// Why a decision leads to no exchange call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Entry without a positive quantity
    MissingQuantity,
    /// Stop-loss update without a positive stop price
    MissingStopLoss,
    /// Action the dispatcher does not know
    UnknownAction(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingQuantity => write!(f, "entry requires a positive quantity"),
            SkipReason::MissingStopLoss => write!(f, "stop-loss update requires a positive stop price"),
            SkipReason::UnknownAction(action) => write!(f, "unknown action {:?}", action),
        }
    }
}

/// What a decision resolves to, before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Market entry. `rejected_stop` is set when a requested stop-loss was
    /// dropped for being on the wrong side of the market.
    PlaceOrder {
        intent: OrderIntent,
        rejected_stop: Option<StopLossViolation>,
    },
    ClosePosition { instrument: String },
    UpdateStopLoss { instrument: String, stop_loss: Decimal },
    Hold,
    Skip(SkipReason),
}

/// Result of dispatching one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    OrderPlaced { order: OrderResult, protected: bool },
    PositionClosed(OrderResult),
    StopLossUpdated(StopLossUpdate),
    Held,
    Skipped(SkipReason),
}

/// Map a decision to an execution plan.
///
/// `current_price` is only consulted for entries carrying a stop-loss; when
/// it is unknown the stop is trusted. A stop on the wrong side is dropped
/// and reported in the plan, and the entry goes ahead unprotected.
pub fn plan_decision(
    instrument: &str,
    decision: &Decision,
    current_price: Option<Decimal>,
) -> Result<ExecutionPlan, DispatchError> {
    if instrument.trim().is_empty() {
        return Err(DispatchError::InvalidDecision(format!(
            "{} has no instrument",
            decision.action
        )));
    }

    let side = match &decision.action {
        DecisionAction::EntryLong => Side::Buy,
        DecisionAction::EntryShort => Side::Sell,
        DecisionAction::ExitLong | DecisionAction::ExitShort => {
            return Ok(ExecutionPlan::ClosePosition {
                instrument: instrument.to_string(),
            })
        }
        DecisionAction::UpdateStopLoss => {
            return Ok(match decision.valid_stop_loss() {
                Some(stop_loss) => ExecutionPlan::UpdateStopLoss {
                    instrument: instrument.to_string(),
                    stop_loss,
                },
                None => ExecutionPlan::Skip(SkipReason::MissingStopLoss),
            })
        }
        DecisionAction::NoOp => return Ok(ExecutionPlan::Hold),
        DecisionAction::Unknown(raw) => {
            return Ok(ExecutionPlan::Skip(SkipReason::UnknownAction(raw.clone())))
        }
    };

    let Some(quantity) = decision.valid_quantity() else {
        return Ok(ExecutionPlan::Skip(SkipReason::MissingQuantity));
    };

    let mut intent = OrderIntent::market(instrument, side, quantity);
    let mut rejected_stop = None;

    if let Some(stop_loss) = decision.valid_stop_loss() {
        let check = validate_stop_loss(side, stop_loss, current_price);
        match check.violation() {
            Some(violation) => rejected_stop = Some(violation.clone()),
            None => {
                let mut legs = ProtectiveLegs::stop(stop_loss);
                if let Some(take_profit) = decision.valid_take_profit() {
                    legs = legs.with_take_profit(take_profit);
                }
                intent = intent.with_protective_legs(legs);
            }
        }
    }

    Ok(ExecutionPlan::PlaceOrder {
        intent,
        rejected_stop,
    })
}

/// Executes decisions against an exchange gateway.
pub struct DecisionDispatcher {
    gateway: Arc<dyn ExchangeGateway>,
    reconciler: StopLossReconciler,
}

impl DecisionDispatcher {
    /// Create a new dispatcher.
    pub fn new(gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self {
            reconciler: StopLossReconciler::new(gateway.clone()),
            gateway,
        }
    }

    /// Dispatch one decision for an instrument.
    ///
    /// The ticker is fetched only for entries with a usable quantity that
    /// carry a stop-loss. Any gateway failure is returned to the caller.
    pub async fn dispatch(
        &self,
        instrument: &str,
        decision: &Decision,
    ) -> Result<DispatchOutcome, DispatchError> {
        info!(
            instrument = %instrument,
            action = %decision.action,
            quantity = ?decision.quantity,
            stop_loss = ?decision.stop_loss,
            take_profit = ?decision.take_profit,
            reason = decision.reason.as_deref().unwrap_or(""),
            "Dispatching decision"
        );

        let needs_price = decision.action.is_entry()
            && decision.valid_quantity().is_some()
            && decision.valid_stop_loss().is_some();
        let current_price = if needs_price {
            self.gateway
                .ticker(instrument)
                .await?
                .and_then(|ticker| ticker.current_price())
        } else {
            None
        };

        let plan = plan_decision(instrument, decision, current_price)?;
        self.execute(instrument, plan).await
    }

    async fn execute(
        &self,
        instrument: &str,
        plan: ExecutionPlan,
    ) -> Result<DispatchOutcome, DispatchError> {
        match plan {
            ExecutionPlan::PlaceOrder {
                intent,
                rejected_stop,
            } => {
                if let Some(violation) = &rejected_stop {
                    warn!(
                        instrument = %instrument,
                        side = %intent.side,
                        stop_loss = %violation.stop_loss,
                        current_price = %violation.current_price,
                        "Invalid stop-loss: {}; placing order without protective legs",
                        violation
                    );
                }

                let order = self.gateway.place_order(&intent).await?;
                let protected = intent.protective_legs.is_some();
                info!(
                    instrument = %instrument,
                    side = %intent.side,
                    size = %intent.size,
                    stop_loss = ?intent.stop_trigger_price(),
                    take_profit = ?intent.protective_legs.as_ref().and_then(|l| l.take_profit_trigger_price),
                    order_id = order.order_id.as_deref().unwrap_or(""),
                    "Market order placed"
                );
                Ok(DispatchOutcome::OrderPlaced { order, protected })
            }

            ExecutionPlan::ClosePosition { instrument } => {
                let result = self.gateway.close_position(&instrument).await?;
                info!(instrument = %instrument, "Position closed at market");
                Ok(DispatchOutcome::PositionClosed(result))
            }

            ExecutionPlan::UpdateStopLoss {
                instrument,
                stop_loss,
            } => {
                let update = self
                    .reconciler
                    .update_stop_loss(&instrument, stop_loss)
                    .await?;
                Ok(DispatchOutcome::StopLossUpdated(update))
            }

            ExecutionPlan::Hold => {
                info!(instrument = %instrument, "No action, holding");
                Ok(DispatchOutcome::Held)
            }

            ExecutionPlan::Skip(reason) => {
                warn!(instrument = %instrument, reason = %reason, "Decision skipped");
                Ok(DispatchOutcome::Skipped(reason))
            }
        }
    }
}
