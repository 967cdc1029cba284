//! Exchange gateway trait definition.

use crate::error::GatewayError;
use crate::types::{
    AlgoOrderKind, AmendAlgoRequest, AmendResult, Balance, Candle, OrderIntent, OrderResult,
    Position, ProtectiveOrder, Ticker, Timeframe,
};
use async_trait::async_trait;

/// Authenticated access to a derivatives exchange.
///
/// The dispatcher and reconciler only ever talk to the exchange through this
/// trait; timeouts and retries are the implementation's concern.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Place an order, including any attached protective legs.
    async fn place_order(&self, intent: &OrderIntent) -> Result<OrderResult, GatewayError>;

    /// Close every open position on the instrument at market
    /// (cross margin, net mode).
    async fn close_position(&self, instrument: &str) -> Result<OrderResult, GatewayError>;

    /// List pending protective orders of one kind for the instrument.
    async fn pending_algo_orders(
        &self,
        instrument: &str,
        kind: AlgoOrderKind,
    ) -> Result<Vec<ProtectiveOrder>, GatewayError>;

    /// Amend a pending protective order identified by its exchange id.
    async fn amend_algo_order(&self, request: &AmendAlgoRequest)
        -> Result<AmendResult, GatewayError>;

    /// Latest ticker, or `None` when the exchange has nothing for the instrument.
    async fn ticker(&self, instrument: &str) -> Result<Option<Ticker>, GatewayError>;

    /// Recent candles, newest first as the exchange returns them.
    async fn candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError>;

    /// Balance for one currency.
    async fn balance(&self, currency: &str) -> Result<Balance, GatewayError>;

    /// Open positions on the instrument.
    async fn positions(&self, instrument: &str) -> Result<Vec<Position>, GatewayError>;

    /// Whether an amend leaves fields it does not mention untouched.
    ///
    /// When this is `false`, callers must resubmit every field they want kept.
    fn supports_partial_amend(&self) -> bool {
        true
    }

    /// Get the gateway name.
    fn name(&self) -> &str;
}
