//! Order intents, protective orders and exchange acknowledgements.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the sign for position calculations (+1 for buy, -1 for sell).
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type. Entries are always executed at market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
        }
    }
}

/// Margin mode used for orders and position closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    /// All positions share the account's margin pool.
    #[default]
    Cross,
    Isolated,
}

impl MarginMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginMode::Cross => "cross",
            MarginMode::Isolated => "isolated",
        }
    }
}

/// Price source a protective leg is triggered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPriceType {
    /// Last traded price
    #[default]
    Last,
}

impl TriggerPriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerPriceType::Last => "last",
        }
    }
}

/// Stop-loss and optional take-profit attached to an entry order.
///
/// Both legs execute at market once their trigger price is hit. A take-profit
/// can only ride along with a stop, never on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectiveLegs {
    pub stop_trigger_price: Decimal,
    pub take_profit_trigger_price: Option<Decimal>,
    pub trigger_price_type: TriggerPriceType,
}

impl ProtectiveLegs {
    /// Stop-loss only, triggered on the last traded price.
    pub fn stop(stop_trigger_price: Decimal) -> Self {
        Self {
            stop_trigger_price,
            take_profit_trigger_price: None,
            trigger_price_type: TriggerPriceType::Last,
        }
    }

    pub fn with_take_profit(mut self, take_profit_trigger_price: Decimal) -> Self {
        self.take_profit_trigger_price = Some(take_profit_trigger_price);
        self
    }

    /// Kind of algo order the exchange files these legs under.
    pub fn kind(&self) -> AlgoOrderKind {
        if self.take_profit_trigger_price.is_some() {
            AlgoOrderKind::Oco
        } else {
            AlgoOrderKind::Conditional
        }
    }
}

/// Order to be sent for one decision. Built per decision and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Instrument to trade, e.g. `BTC-USDT-SWAP`
    pub instrument: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Size in contracts
    pub size: Decimal,
    pub margin_mode: MarginMode,
    pub protective_legs: Option<ProtectiveLegs>,
}

impl OrderIntent {
    /// Create a cross-margin market order.
    pub fn market(instrument: impl Into<String>, side: Side, size: Decimal) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            order_type: OrderType::Market,
            size,
            margin_mode: MarginMode::Cross,
            protective_legs: None,
        }
    }

    /// Attach protective legs.
    pub fn with_protective_legs(mut self, legs: ProtectiveLegs) -> Self {
        self.protective_legs = Some(legs);
        self
    }

    pub fn stop_trigger_price(&self) -> Option<Decimal> {
        self.protective_legs.map(|l| l.stop_trigger_price)
    }
}

/// Category the exchange files a pending protective order under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgoOrderKind {
    /// Take-profit and stop-loss pair
    Oco,
    /// Single-leg stop-loss or take-profit
    Conditional,
}

impl AlgoOrderKind {
    /// Both kinds, in the order they are queried.
    pub const ALL: [AlgoOrderKind; 2] = [AlgoOrderKind::Oco, AlgoOrderKind::Conditional];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgoOrderKind::Oco => "oco",
            AlgoOrderKind::Conditional => "conditional",
        }
    }
}

impl std::fmt::Display for AlgoOrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending protective order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectiveOrder {
    /// Exchange-assigned algo order id
    pub algo_id: String,
    pub instrument: String,
    pub kind: AlgoOrderKind,
    pub stop_trigger_price: Option<Decimal>,
    pub take_profit_trigger_price: Option<Decimal>,
}

impl ProtectiveOrder {
    /// Check if the order carries a live stop-loss leg.
    pub fn has_active_stop_loss(&self) -> bool {
        self.stop_trigger_price
            .map(|p| p > Decimal::ZERO)
            .unwrap_or(false)
    }
}

/// Partial update of a pending protective order. Absent fields are left as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendAlgoRequest {
    pub instrument: String,
    pub algo_id: String,
    pub new_stop_trigger_price: Option<Decimal>,
    pub new_take_profit_trigger_price: Option<Decimal>,
}

impl AmendAlgoRequest {
    /// Move only the stop trigger of an existing order.
    pub fn stop_only(order: &ProtectiveOrder, new_stop: Decimal) -> Self {
        Self {
            instrument: order.instrument.clone(),
            algo_id: order.algo_id.clone(),
            new_stop_trigger_price: Some(new_stop),
            new_take_profit_trigger_price: None,
        }
    }

    /// Also resubmit a take-profit value unchanged.
    pub fn with_take_profit(mut self, take_profit: Option<Decimal>) -> Self {
        self.new_take_profit_trigger_price = take_profit;
        self
    }
}

/// Exchange acknowledgement of a placed order or a position close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange order id; closes do not always return one
    pub order_id: Option<String>,
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
}

/// Exchange acknowledgement of an amended protective order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendResult {
    pub algo_id: String,
    pub instrument: String,
    pub request_id: Option<String>,
}
