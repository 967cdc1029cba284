//! OKX v5 REST gateway.
//!
//! Request bodies and response records for the endpoints the gateway uses,
//! plus conversions to and from the core types. [`OkxGateway`] maps the
//! gateway trait onto them; moving bytes is left to an [`OkxTransport`],
//! normally the signed [`HttpTransport`].

mod gateway;
mod transport;

pub use gateway::{OkxGateway, OkxTransport};
pub use transport::HttpTransport;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use trading_core::error::GatewayError;
use trading_core::types::{
    AlgoOrderKind, AmendAlgoRequest, AmendResult, Balance, Candle, MarginMode, OrderIntent,
    OrderResult, Position, PositionSide, ProtectiveOrder, Ticker, Timeframe,
};

/// Execution price sentinel meaning "fill at market once triggered".
pub const MARKET_ORDER_PRICE: &str = "-1";

/// Endpoint paths.
pub mod paths {
    pub const PLACE_ORDER: &str = "/api/v5/trade/order";
    pub const CLOSE_POSITION: &str = "/api/v5/trade/close-position";
    pub const PENDING_ALGO_ORDERS: &str = "/api/v5/trade/orders-algo-pending";
    pub const AMEND_ALGO_ORDER: &str = "/api/v5/trade/amend-algos";
    pub const TICKER: &str = "/api/v5/market/ticker";
    pub const CANDLES: &str = "/api/v5/market/candles";
    pub const BALANCE: &str = "/api/v5/account/balance";
    pub const POSITIONS: &str = "/api/v5/account/positions";
}

/// API credentials, read from the environment variables the config names.
#[derive(Clone)]
pub struct OkxCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl OkxCredentials {
    /// Load from environment variables.
    pub fn from_env(key_var: &str, secret_var: &str, passphrase_var: &str) -> Result<Self, GatewayError> {
        let read = |var: &str| {
            std::env::var(var)
                .map_err(|_| GatewayError::Configuration(format!("{} not set", var)))
        };

        Ok(Self {
            api_key: read(key_var)?,
            api_secret: read(secret_var)?,
            passphrase: read(passphrase_var)?,
        })
    }
}

impl std::fmt::Debug for OkxCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OkxCredentials")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .field("passphrase", &"***")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /api/v5/trade/order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub inst_id: String,
    pub td_mode: String,
    pub side: String,
    pub ord_type: String,
    pub sz: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attach_algo_ords: Vec<AttachAlgoOrder>,
}

/// Protective legs attached to an entry; both legs live in one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachAlgoOrder {
    pub tp_sl_mode: String,
    pub sl_trigger_px: String,
    pub sl_ord_px: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_trigger_px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_ord_px: Option<String>,
}

impl From<&OrderIntent> for PlaceOrderRequest {
    fn from(intent: &OrderIntent) -> Self {
        let attach_algo_ords = intent
            .protective_legs
            .map(|legs| AttachAlgoOrder {
                tp_sl_mode: legs.trigger_price_type.as_str().to_string(),
                sl_trigger_px: legs.stop_trigger_price.to_string(),
                sl_ord_px: MARKET_ORDER_PRICE.to_string(),
                tp_trigger_px: legs.take_profit_trigger_price.map(|p| p.to_string()),
                tp_ord_px: legs
                    .take_profit_trigger_price
                    .map(|_| MARKET_ORDER_PRICE.to_string()),
            })
            .into_iter()
            .collect();

        Self {
            inst_id: intent.instrument.clone(),
            td_mode: intent.margin_mode.as_str().to_string(),
            side: intent.side.as_str().to_string(),
            ord_type: intent.order_type.as_str().to_string(),
            sz: intent.size.to_string(),
            attach_algo_ords,
        }
    }
}

/// Body of `POST /api/v5/trade/close-position`.
///
/// No `posSide`: positions are held in net mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionRequest {
    pub inst_id: String,
    pub mgn_mode: String,
}

impl ClosePositionRequest {
    pub fn new(instrument: impl Into<String>, margin_mode: MarginMode) -> Self {
        Self {
            inst_id: instrument.into(),
            mgn_mode: margin_mode.as_str().to_string(),
        }
    }
}

/// Query of `GET /api/v5/trade/orders-algo-pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAlgoOrdersQuery {
    pub inst_id: String,
    pub ord_type: String,
}

impl PendingAlgoOrdersQuery {
    pub fn new(instrument: impl Into<String>, kind: AlgoOrderKind) -> Self {
        Self {
            inst_id: instrument.into(),
            ord_type: kind.as_str().to_string(),
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![("instId", self.inst_id.clone()), ("ordType", self.ord_type.clone())]
    }
}

/// Body of `POST /api/v5/trade/amend-algos`. Omitted fields stay unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendAlgoRequestBody {
    pub inst_id: String,
    pub algo_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sl_trigger_px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_tp_trigger_px: Option<String>,
}

impl From<&AmendAlgoRequest> for AmendAlgoRequestBody {
    fn from(request: &AmendAlgoRequest) -> Self {
        Self {
            inst_id: request.instrument.clone(),
            algo_id: request.algo_id.clone(),
            new_sl_trigger_px: request.new_stop_trigger_price.map(|p| p.to_string()),
            new_tp_trigger_px: request.new_take_profit_trigger_price.map(|p| p.to_string()),
        }
    }
}

/// Query of `GET /api/v5/market/candles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandlesQuery {
    pub inst_id: String,
    pub bar: String,
    pub limit: String,
}

impl CandlesQuery {
    pub fn new(instrument: impl Into<String>, timeframe: Timeframe, limit: usize) -> Self {
        Self {
            inst_id: instrument.into(),
            bar: timeframe.as_bar().to_string(),
            limit: limit.to_string(),
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("instId", self.inst_id.clone()),
            ("bar", self.bar.clone()),
            ("limit", self.limit.clone()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Every v5 response: `code == "0"` on success, records in `data`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Envelope<T> {
    /// Unwrap the records, mapping a non-zero code to a gateway error.
    pub fn into_result(self) -> Result<Vec<T>, GatewayError> {
        match self.code.as_str() {
            "0" => Ok(self.data),
            "50011" => Err(GatewayError::RateLimited { retry_after_secs: 1 }),
            "50111" | "50113" => Err(GatewayError::Authentication(self.msg)),
            _ => Err(GatewayError::Api {
                code: self.code,
                message: self.msg,
            }),
        }
    }
}

/// Parse a response body into its records.
pub fn parse_response<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, GatewayError> {
    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
    envelope.into_result()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

impl OrderData {
    pub fn into_order_result(self, instrument: &str) -> Result<OrderResult, GatewayError> {
        check_item_code(&self.s_code, &self.s_msg)?;
        Ok(OrderResult {
            order_id: non_empty(self.ord_id),
            instrument: instrument.to_string(),
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionData {
    pub inst_id: String,
    #[serde(default)]
    pub pos_side: String,
}

impl From<ClosePositionData> for OrderResult {
    fn from(data: ClosePositionData) -> Self {
        OrderResult {
            order_id: None,
            instrument: data.inst_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgoOrderData {
    pub algo_id: String,
    pub inst_id: String,
    pub ord_type: String,
    #[serde(default)]
    pub sl_trigger_px: String,
    #[serde(default)]
    pub tp_trigger_px: String,
}

impl TryFrom<AlgoOrderData> for ProtectiveOrder {
    type Error = GatewayError;

    fn try_from(data: AlgoOrderData) -> Result<Self, Self::Error> {
        let kind = match data.ord_type.as_str() {
            "oco" => AlgoOrderKind::Oco,
            "conditional" => AlgoOrderKind::Conditional,
            other => {
                return Err(GatewayError::InvalidResponse(format!(
                    "Unknown algo order type: {}",
                    other
                )))
            }
        };

        Ok(ProtectiveOrder {
            stop_trigger_price: parse_price("slTriggerPx", &data.sl_trigger_px)?,
            take_profit_trigger_price: parse_price("tpTriggerPx", &data.tp_trigger_px)?,
            algo_id: data.algo_id,
            instrument: data.inst_id,
            kind,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendAlgoData {
    pub algo_id: String,
    #[serde(default)]
    pub req_id: String,
    #[serde(default)]
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

impl AmendAlgoData {
    pub fn into_amend_result(self, instrument: &str) -> Result<AmendResult, GatewayError> {
        check_item_code(&self.s_code, &self.s_msg)?;
        Ok(AmendResult {
            algo_id: self.algo_id,
            instrument: instrument.to_string(),
            request_id: non_empty(self.req_id),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerData {
    pub inst_id: String,
    pub last: String,
    #[serde(default)]
    pub bid_px: String,
    #[serde(default)]
    pub ask_px: String,
    #[serde(default)]
    pub ts: String,
}

impl TryFrom<TickerData> for Ticker {
    type Error = GatewayError;

    fn try_from(data: TickerData) -> Result<Self, Self::Error> {
        Ok(Ticker {
            last: parse_price("last", &data.last)?.unwrap_or(Decimal::ZERO),
            bid: parse_price("bidPx", &data.bid_px)?,
            ask: parse_price("askPx", &data.ask_px)?,
            timestamp: data.ts.parse().unwrap_or(0),
            instrument: data.inst_id,
        })
    }
}

/// Candle rows arrive as positional string arrays, newest first.
pub fn parse_candles(rows: Vec<Vec<String>>) -> Result<Vec<Candle>, GatewayError> {
    rows.iter()
        .map(|row| Candle::from_raw(row).map_err(|e| GatewayError::InvalidResponse(e.to_string())))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalanceData {
    #[serde(default)]
    pub details: Vec<BalanceDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDetail {
    pub ccy: String,
    #[serde(default)]
    pub avail_bal: String,
    #[serde(default)]
    pub frozen_bal: String,
}

impl AccountBalanceData {
    /// Balance of one currency; a currency absent from the account is zero.
    pub fn balance(&self, currency: &str) -> Result<Balance, GatewayError> {
        match self.details.iter().find(|d| d.ccy == currency) {
            Some(detail) => Ok(Balance::new(
                currency,
                parse_price("availBal", &detail.avail_bal)?.unwrap_or_default(),
                parse_price("frozenBal", &detail.frozen_bal)?.unwrap_or_default(),
            )),
            None => Ok(Balance::new(currency, Decimal::ZERO, Decimal::ZERO)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub inst_id: String,
    #[serde(default)]
    pub pos_side: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub avg_px: String,
    #[serde(default)]
    pub upl: String,
    #[serde(default)]
    pub lever: String,
    #[serde(default)]
    pub mgn_mode: String,
    #[serde(default)]
    pub mark_px: String,
    #[serde(default)]
    pub liq_px: String,
}

impl TryFrom<PositionData> for Position {
    type Error = GatewayError;

    fn try_from(data: PositionData) -> Result<Self, Self::Error> {
        let side = match data.pos_side.as_str() {
            "long" => PositionSide::Long,
            "short" => PositionSide::Short,
            _ => PositionSide::Net,
        };
        let margin_mode = match data.mgn_mode.as_str() {
            "isolated" => MarginMode::Isolated,
            _ => MarginMode::Cross,
        };

        Ok(Position {
            side,
            quantity: parse_price("pos", &data.pos)?.unwrap_or_default(),
            avg_entry_price: parse_price("avgPx", &data.avg_px)?.unwrap_or_default(),
            unrealized_pnl: parse_price("upl", &data.upl)?.unwrap_or_default(),
            leverage: parse_price("lever", &data.lever)?.unwrap_or(Decimal::ONE),
            margin_mode,
            mark_price: parse_price("markPx", &data.mark_px)?,
            liquidation_price: parse_price("liqPx", &data.liq_px)?,
            instrument: data.inst_id,
        })
    }
}

/// Empty strings mean "not set"; anything else must be a decimal.
fn parse_price(field: &str, raw: &str) -> Result<Option<Decimal>, GatewayError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map(Some)
        .map_err(|_| GatewayError::InvalidResponse(format!("{} is not a number: {:?}", field, raw)))
}

fn check_item_code(code: &str, message: &str) -> Result<(), GatewayError> {
    if code.is_empty() || code == "0" {
        Ok(())
    } else {
        Err(GatewayError::OrderRejected(format!("{}: {}", code, message)))
    }
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|v| !v.is_empty())
}
