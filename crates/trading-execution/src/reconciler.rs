//! Moves the stop-loss of protective orders already resting on the exchange.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trading_core::error::GatewayError;
use trading_core::traits::ExchangeGateway;
use trading_core::types::{AlgoOrderKind, AmendAlgoRequest, AmendResult, ProtectiveOrder};

/// Result of a stop-loss update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopLossUpdate {
    /// No pending order carries a stop-loss; nothing was amended.
    NoOrdersFound,
    /// One result per amended order.
    Amended(Vec<AmendResult>),
}

impl StopLossUpdate {
    /// Number of orders amended.
    pub fn amended_count(&self) -> usize {
        match self {
            StopLossUpdate::NoOrdersFound => 0,
            StopLossUpdate::Amended(results) => results.len(),
        }
    }
}

/// Locates pending protective orders and amends their stop trigger.
///
/// Only orders the exchange already holds are touched, each by its own
/// exchange id; no order is ever created here.
pub struct StopLossReconciler {
    gateway: Arc<dyn ExchangeGateway>,
}

impl StopLossReconciler {
    pub fn new(gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self { gateway }
    }

    /// Set `new_stop` on every pending OCO and conditional order of
    /// `instrument` that carries an active stop-loss.
    ///
    /// Any gateway failure aborts the update and is returned; amends already
    /// applied stay applied.
    pub async fn update_stop_loss(
        &self,
        instrument: &str,
        new_stop: Decimal,
    ) -> Result<StopLossUpdate, GatewayError> {
        info!(instrument = %instrument, new_stop = %new_stop, "Updating stop-loss");

        let mut pending = Vec::new();
        for kind in AlgoOrderKind::ALL {
            let orders = self.gateway.pending_algo_orders(instrument, kind).await?;
            debug!(instrument = %instrument, kind = %kind, count = orders.len(), "Pending algo orders");
            pending.extend(orders);
        }

        if pending.is_empty() {
            warn!(instrument = %instrument, "No pending algo orders, cannot update stop-loss");
            return Ok(StopLossUpdate::NoOrdersFound);
        }

        let with_stop: Vec<ProtectiveOrder> = pending
            .into_iter()
            .filter(ProtectiveOrder::has_active_stop_loss)
            .collect();

        if with_stop.is_empty() {
            warn!(instrument = %instrument, "No pending order carries a stop-loss");
            return Ok(StopLossUpdate::NoOrdersFound);
        }

        let resubmit_take_profit = !self.gateway.supports_partial_amend();
        let mut results = Vec::with_capacity(with_stop.len());

        for order in &with_stop {
            info!(
                instrument = %instrument,
                algo_id = %order.algo_id,
                kind = %order.kind,
                current_stop = ?order.stop_trigger_price,
                new_stop = %new_stop,
                "Amending stop-loss"
            );

            let mut request = AmendAlgoRequest::stop_only(order, new_stop);
            if resubmit_take_profit {
                request = request.with_take_profit(order.take_profit_trigger_price);
            }

            let result = self.gateway.amend_algo_order(&request).await?;
            info!(
                instrument = %instrument,
                algo_id = %result.algo_id,
                "Stop-loss amended"
            );
            results.push(result);
        }

        Ok(StopLossUpdate::Amended(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_broker::{GatewayCall, GatewayOperation, PaperGateway};

    const BTC: &str = "BTC-USDT-SWAP";

    fn protective(
        algo_id: &str,
        kind: AlgoOrderKind,
        stop: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> ProtectiveOrder {
        ProtectiveOrder {
            algo_id: algo_id.to_string(),
            instrument: BTC.to_string(),
            kind,
            stop_trigger_price: stop,
            take_profit_trigger_price: take_profit,
        }
    }

    fn amend_requests(gateway: &PaperGateway) -> Vec<AmendAlgoRequest> {
        gateway
            .calls_of(GatewayOperation::AmendAlgoOrder)
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::AmendAlgoOrder(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_no_pending_orders() {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        let reconciler = StopLossReconciler::new(gateway.clone());

        let update = reconciler.update_stop_loss(BTC, dec!(48000)).await.unwrap();

        assert_eq!(update, StopLossUpdate::NoOrdersFound);
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::PendingAlgoOrders {
                    instrument: BTC.to_string(),
                    kind: AlgoOrderKind::Oco
                },
                GatewayCall::PendingAlgoOrders {
                    instrument: BTC.to_string(),
                    kind: AlgoOrderKind::Conditional
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_take_profit_only_order_is_not_amended() {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        gateway.seed_algo_order(protective("tp", AlgoOrderKind::Oco, None, Some(dec!(55000))));
        gateway.seed_algo_order(protective("zero", AlgoOrderKind::Conditional, Some(Decimal::ZERO), None));
        let reconciler = StopLossReconciler::new(gateway.clone());

        let update = reconciler.update_stop_loss(BTC, dec!(48000)).await.unwrap();

        assert_eq!(update, StopLossUpdate::NoOrdersFound);
        assert_eq!(update.amended_count(), 0);
        assert!(amend_requests(&gateway).is_empty());
    }

    #[tokio::test]
    async fn test_amends_every_order_with_a_stop() {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        gateway.seed_algo_order(protective("oco", AlgoOrderKind::Oco, Some(dec!(47000)), Some(dec!(55000))));
        gateway.seed_algo_order(protective("cond", AlgoOrderKind::Conditional, Some(dec!(46000)), None));
        gateway.seed_algo_order(protective("tp", AlgoOrderKind::Oco, None, Some(dec!(56000))));
        let reconciler = StopLossReconciler::new(gateway.clone());

        let update = reconciler.update_stop_loss(BTC, dec!(48000)).await.unwrap();
        assert_eq!(update.amended_count(), 2);

        let requests = amend_requests(&gateway);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].algo_id, "oco");
        assert_eq!(requests[1].algo_id, "cond");
        for request in &requests {
            assert_eq!(request.new_stop_trigger_price, Some(dec!(48000)));
            assert_eq!(request.new_take_profit_trigger_price, None);
        }

        let book = gateway.algo_orders();
        assert_eq!(book[0].stop_trigger_price, Some(dec!(48000)));
        assert_eq!(book[0].take_profit_trigger_price, Some(dec!(55000)));
        assert_eq!(book[1].stop_trigger_price, Some(dec!(48000)));
        assert_eq!(book[2].stop_trigger_price, None);
    }

    #[tokio::test]
    async fn test_full_replace_gateway_gets_take_profit_resubmitted() {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)).with_partial_amend(false));
        gateway.seed_algo_order(protective("oco", AlgoOrderKind::Oco, Some(dec!(47000)), Some(dec!(55000))));
        let reconciler = StopLossReconciler::new(gateway.clone());

        reconciler.update_stop_loss(BTC, dec!(48000)).await.unwrap();

        let requests = amend_requests(&gateway);
        assert_eq!(requests[0].new_take_profit_trigger_price, Some(dec!(55000)));
        assert_eq!(gateway.algo_orders()[0].take_profit_trigger_price, Some(dec!(55000)));
    }

    #[tokio::test]
    async fn test_failures_propagate() {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        gateway.seed_algo_order(protective("oco", AlgoOrderKind::Oco, Some(dec!(47000)), None));
        let reconciler = StopLossReconciler::new(gateway.clone());

        gateway.fail_next(
            GatewayOperation::PendingAlgoOrders,
            GatewayError::Connection("reset".to_string()),
        );
        assert!(reconciler.update_stop_loss(BTC, dec!(48000)).await.is_err());

        gateway.fail_next(
            GatewayOperation::AmendAlgoOrder,
            GatewayError::Api {
                code: "51000".to_string(),
                message: "Parameter error".to_string(),
            },
        );
        let err = reconciler.update_stop_loss(BTC, dec!(48000)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Api { .. }));
    }
}
