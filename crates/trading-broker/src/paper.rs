//! In-memory exchange for simulation and tests.
//!
//! Market orders fill at the last ticker price, positions are held in net
//! mode, and attached protective legs become pending algo orders that can be
//! listed and amended like on the real exchange. Every call is recorded, and
//! failures can be injected per operation or per instrument.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use trading_core::error::GatewayError;
use trading_core::traits::ExchangeGateway;
use trading_core::types::{
    AlgoOrderKind, AmendAlgoRequest, AmendResult, Balance, Candle, OrderIntent, OrderResult,
    Position, ProtectiveOrder, Ticker, Timeframe,
};
use uuid::Uuid;

/// Gateway operations, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOperation {
    PlaceOrder,
    ClosePosition,
    PendingAlgoOrders,
    AmendAlgoOrder,
    Ticker,
    Candles,
    Balance,
    Positions,
}

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    PlaceOrder(OrderIntent),
    ClosePosition { instrument: String },
    PendingAlgoOrders { instrument: String, kind: AlgoOrderKind },
    AmendAlgoOrder(AmendAlgoRequest),
    Ticker { instrument: String },
    Candles { instrument: String, timeframe: Timeframe, limit: usize },
    Balance { currency: String },
    Positions { instrument: String },
}

impl GatewayCall {
    pub fn operation(&self) -> GatewayOperation {
        match self {
            GatewayCall::PlaceOrder(_) => GatewayOperation::PlaceOrder,
            GatewayCall::ClosePosition { .. } => GatewayOperation::ClosePosition,
            GatewayCall::PendingAlgoOrders { .. } => GatewayOperation::PendingAlgoOrders,
            GatewayCall::AmendAlgoOrder(_) => GatewayOperation::AmendAlgoOrder,
            GatewayCall::Ticker { .. } => GatewayOperation::Ticker,
            GatewayCall::Candles { .. } => GatewayOperation::Candles,
            GatewayCall::Balance { .. } => GatewayOperation::Balance,
            GatewayCall::Positions { .. } => GatewayOperation::Positions,
        }
    }

    /// Instrument the call targets, if any.
    pub fn instrument(&self) -> Option<&str> {
        match self {
            GatewayCall::PlaceOrder(intent) => Some(&intent.instrument),
            GatewayCall::AmendAlgoOrder(request) => Some(&request.instrument),
            GatewayCall::ClosePosition { instrument }
            | GatewayCall::PendingAlgoOrders { instrument, .. }
            | GatewayCall::Ticker { instrument }
            | GatewayCall::Candles { instrument, .. }
            | GatewayCall::Positions { instrument } => Some(instrument),
            GatewayCall::Balance { .. } => None,
        }
    }
}

/// Simulated account state.
#[derive(Debug, Default)]
struct PaperBook {
    quote_currency: String,
    cash: Decimal,
    tickers: HashMap<String, Ticker>,
    /// Oldest first
    candles: HashMap<String, Vec<Candle>>,
    positions: HashMap<String, Position>,
    algo_orders: Vec<ProtectiveOrder>,
}

#[derive(Debug, Default)]
struct FailurePlan {
    next: HashMap<GatewayOperation, VecDeque<GatewayError>>,
    instruments: HashMap<String, GatewayError>,
}

impl FailurePlan {
    fn take(&mut self, call: &GatewayCall) -> Option<GatewayError> {
        if let Some(err) = call.instrument().and_then(|i| self.instruments.get(i)) {
            return Some(err.clone());
        }
        self.next.get_mut(&call.operation()).and_then(VecDeque::pop_front)
    }
}

/// Paper exchange gateway.
#[derive(Debug, Clone)]
pub struct PaperGateway {
    book: Arc<Mutex<PaperBook>>,
    calls: Arc<Mutex<Vec<GatewayCall>>>,
    failures: Arc<Mutex<FailurePlan>>,
    partial_amend: bool,
}

impl PaperGateway {
    /// Create a paper account holding `initial_balance` of `quote_currency`.
    pub fn new(quote_currency: impl Into<String>, initial_balance: Decimal) -> Self {
        let book = PaperBook {
            quote_currency: quote_currency.into(),
            cash: initial_balance,
            ..Default::default()
        };
        Self {
            book: Arc::new(Mutex::new(book)),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(FailurePlan::default())),
            partial_amend: true,
        }
    }

    /// Choose whether amends leave unmentioned fields untouched.
    ///
    /// With `false`, an amend replaces the take-profit trigger with whatever
    /// the request carries, clearing it when absent.
    pub fn with_partial_amend(mut self, partial_amend: bool) -> Self {
        self.partial_amend = partial_amend;
        self
    }

    /// Set the last traded price for an instrument.
    pub fn set_ticker(&self, instrument: &str, last: Decimal) {
        let mut book = lock(&self.book);
        let mut ticker = Ticker::new(instrument, last);
        ticker.timestamp = Utc::now().timestamp_millis();
        if let Some(position) = book.positions.get_mut(instrument) {
            if position.update_price(last).is_none() {
                debug!(instrument = %instrument, price = %last, "Unrealized P&L out of range, mark not updated");
            }
        }
        book.tickers.insert(instrument.to_string(), ticker);
    }

    /// Load candle history (oldest first) for an instrument.
    pub fn set_candles(&self, instrument: &str, candles: Vec<Candle>) {
        lock(&self.book).candles.insert(instrument.to_string(), candles);
    }

    /// Register a pending protective order as if placed earlier.
    pub fn seed_algo_order(&self, order: ProtectiveOrder) {
        lock(&self.book).algo_orders.push(order);
    }

    /// Fail the next call of `operation` with `error`.
    pub fn fail_next(&self, operation: GatewayOperation, error: GatewayError) {
        lock(&self.failures)
            .next
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Fail every call touching `instrument` until cleared.
    pub fn fail_instrument(&self, instrument: &str, error: GatewayError) {
        lock(&self.failures)
            .instruments
            .insert(instrument.to_string(), error);
    }

    pub fn clear_failures(&self) {
        *lock(&self.failures) = FailurePlan::default();
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    /// Calls of one operation.
    pub fn calls_of(&self, operation: GatewayOperation) -> Vec<GatewayCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    /// Open positions across all instruments.
    pub fn open_positions(&self) -> Vec<Position> {
        let book = lock(&self.book);
        let mut positions: Vec<Position> = book
            .positions
            .values()
            .filter(|p| p.has_position())
            .cloned()
            .collect();
        positions.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        positions
    }

    /// Pending protective orders across all instruments.
    pub fn algo_orders(&self) -> Vec<ProtectiveOrder> {
        lock(&self.book).algo_orders.clone()
    }

    /// Record the call and apply any injected failure.
    fn begin(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let failure = lock(&self.failures).take(&call);
        lock(&self.calls).push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply a fill to a net position, returning the updated position and the
/// realized P&L, or `None` when any amount overflows a `Decimal`.
fn apply_fill(position: &Position, delta: Decimal, price: Decimal) -> Option<(Position, Decimal)> {
    let mut next = position.clone();
    let current = position.quantity;
    let mut realized = Decimal::ZERO;

    if current.is_zero() || current.is_sign_positive() == delta.is_sign_positive() {
        let total = current.abs().checked_add(delta.abs())?;
        let cost = position
            .avg_entry_price
            .checked_mul(current.abs())?
            .checked_add(price.checked_mul(delta.abs())?)?;
        next.avg_entry_price = cost.checked_div(total)?;
    } else {
        let closed = current.abs().min(delta.abs());
        realized = price
            .checked_sub(position.avg_entry_price)?
            .checked_mul(closed)?
            .checked_mul(current.signum())?;
        if delta.abs() > current.abs() {
            // Flipped through flat
            next.avg_entry_price = price;
        } else if delta.abs() == current.abs() {
            next.avg_entry_price = Decimal::ZERO;
        }
    }

    next.quantity = current.checked_add(delta)?;
    next.update_price(price)?;
    Some((next, realized))
}

fn overflow(what: &str, instrument: &str) -> GatewayError {
    GatewayError::OrderRejected(format!("{} for {} exceeds the representable range", what, instrument))
}

#[async_trait]
impl ExchangeGateway for PaperGateway {
    async fn place_order(&self, intent: &OrderIntent) -> Result<OrderResult, GatewayError> {
        self.begin(GatewayCall::PlaceOrder(intent.clone()))?;

        if intent.size <= Decimal::ZERO {
            return Err(GatewayError::OrderRejected(format!(
                "Invalid size {} for {}",
                intent.size, intent.instrument
            )));
        }

        let mut book = lock(&self.book);
        let price = book
            .tickers
            .get(&intent.instrument)
            .and_then(Ticker::current_price)
            .ok_or_else(|| {
                GatewayError::OrderRejected(format!("No market price for {}", intent.instrument))
            })?;

        let delta = intent.side.sign() * intent.size;
        let mut current = book
            .positions
            .get(&intent.instrument)
            .cloned()
            .unwrap_or_else(|| Position::net(&intent.instrument, Decimal::ZERO, Decimal::ZERO));
        current.margin_mode = intent.margin_mode;

        let (position, realized) = apply_fill(&current, delta, price)
            .ok_or_else(|| overflow("Order value", &intent.instrument))?;
        let cash = book
            .cash
            .checked_add(realized)
            .ok_or_else(|| overflow("Realized P&L", &intent.instrument))?;
        book.positions.insert(intent.instrument.clone(), position);
        book.cash = cash;

        if let Some(legs) = intent.protective_legs {
            book.algo_orders.push(ProtectiveOrder {
                algo_id: Uuid::new_v4().to_string(),
                instrument: intent.instrument.clone(),
                kind: legs.kind(),
                stop_trigger_price: Some(legs.stop_trigger_price),
                take_profit_trigger_price: legs.take_profit_trigger_price,
            });
        }

        let order_id = Uuid::new_v4().to_string();
        debug!(
            instrument = %intent.instrument,
            side = %intent.side,
            size = %intent.size,
            price = %price,
            order_id = %order_id,
            "Paper order filled"
        );

        Ok(OrderResult {
            order_id: Some(order_id),
            instrument: intent.instrument.clone(),
            timestamp: Utc::now(),
        })
    }

    async fn close_position(&self, instrument: &str) -> Result<OrderResult, GatewayError> {
        self.begin(GatewayCall::ClosePosition {
            instrument: instrument.to_string(),
        })?;

        let mut book = lock(&self.book);
        let position = book
            .positions
            .get(instrument)
            .filter(|p| p.has_position())
            .cloned()
            .ok_or_else(|| GatewayError::PositionNotFound(instrument.to_string()))?;

        let price = book
            .tickers
            .get(instrument)
            .and_then(Ticker::current_price)
            .unwrap_or(position.avg_entry_price);
        let cash = price
            .checked_sub(position.avg_entry_price)
            .and_then(|diff| diff.checked_mul(position.quantity))
            .and_then(|realized| book.cash.checked_add(realized).map(|cash| (cash, realized)));
        let (cash, realized) = cash.ok_or_else(|| overflow("Realized P&L", instrument))?;
        book.positions.remove(instrument);
        book.cash = cash;

        // Protective orders go away with the position.
        book.algo_orders.retain(|o| o.instrument != instrument);

        info!(
            instrument = %instrument,
            quantity = %position.quantity,
            price = %price,
            realized_pnl = %realized,
            "Paper position closed"
        );

        Ok(OrderResult {
            order_id: None,
            instrument: instrument.to_string(),
            timestamp: Utc::now(),
        })
    }

    async fn pending_algo_orders(
        &self,
        instrument: &str,
        kind: AlgoOrderKind,
    ) -> Result<Vec<ProtectiveOrder>, GatewayError> {
        self.begin(GatewayCall::PendingAlgoOrders {
            instrument: instrument.to_string(),
            kind,
        })?;

        Ok(lock(&self.book)
            .algo_orders
            .iter()
            .filter(|o| o.instrument == instrument && o.kind == kind)
            .cloned()
            .collect())
    }

    async fn amend_algo_order(
        &self,
        request: &AmendAlgoRequest,
    ) -> Result<AmendResult, GatewayError> {
        self.begin(GatewayCall::AmendAlgoOrder(request.clone()))?;

        let mut book = lock(&self.book);
        let order = book
            .algo_orders
            .iter_mut()
            .find(|o| o.algo_id == request.algo_id && o.instrument == request.instrument)
            .ok_or_else(|| GatewayError::OrderNotFound(request.algo_id.clone()))?;

        if let Some(stop) = request.new_stop_trigger_price {
            order.stop_trigger_price = Some(stop);
        }
        if self.partial_amend {
            if let Some(take_profit) = request.new_take_profit_trigger_price {
                order.take_profit_trigger_price = Some(take_profit);
            }
        } else {
            order.take_profit_trigger_price = request.new_take_profit_trigger_price;
        }

        Ok(AmendResult {
            algo_id: order.algo_id.clone(),
            instrument: order.instrument.clone(),
            request_id: Some(Uuid::new_v4().to_string()),
        })
    }

    async fn ticker(&self, instrument: &str) -> Result<Option<Ticker>, GatewayError> {
        self.begin(GatewayCall::Ticker {
            instrument: instrument.to_string(),
        })?;

        Ok(lock(&self.book).tickers.get(instrument).cloned())
    }

    async fn candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        self.begin(GatewayCall::Candles {
            instrument: instrument.to_string(),
            timeframe,
            limit,
        })?;

        Ok(lock(&self.book)
            .candles
            .get(instrument)
            .map(|candles| candles.iter().rev().take(limit).copied().collect())
            .unwrap_or_default())
    }

    async fn balance(&self, currency: &str) -> Result<Balance, GatewayError> {
        self.begin(GatewayCall::Balance {
            currency: currency.to_string(),
        })?;

        let book = lock(&self.book);
        if currency != book.quote_currency {
            return Ok(Balance::new(currency, Decimal::ZERO, Decimal::ZERO));
        }

        let used = book
            .positions
            .values()
            .try_fold(Decimal::ZERO, |used, p| {
                p.abs_quantity()
                    .checked_mul(p.avg_entry_price)?
                    .checked_div(p.leverage)
                    .and_then(|margin| used.checked_add(margin))
            })
            .ok_or_else(|| GatewayError::InvalidResponse("Margin in use overflows".to_string()))?;
        let free = book
            .cash
            .checked_sub(used)
            .ok_or_else(|| GatewayError::InvalidResponse("Free balance overflows".to_string()))?;
        Ok(Balance::new(currency, free, used))
    }

    async fn positions(&self, instrument: &str) -> Result<Vec<Position>, GatewayError> {
        self.begin(GatewayCall::Positions {
            instrument: instrument.to_string(),
        })?;

        Ok(lock(&self.book)
            .positions
            .get(instrument)
            .filter(|p| p.has_position())
            .cloned()
            .into_iter()
            .collect())
    }

    fn supports_partial_amend(&self) -> bool {
        self.partial_amend
    }

    fn name(&self) -> &str {
        "Paper Exchange"
    }
}
