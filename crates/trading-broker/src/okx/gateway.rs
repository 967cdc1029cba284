//! [`ExchangeGateway`] over the OKX v5 endpoints.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use trading_core::error::GatewayError;
use trading_core::traits::ExchangeGateway;
use trading_core::types::{
    AlgoOrderKind, AmendAlgoRequest, AmendResult, Balance, Candle, MarginMode, OrderIntent,
    OrderResult, Position, ProtectiveOrder, Ticker, Timeframe,
};

use super::{
    parse_candles, parse_response, paths, AccountBalanceData, AlgoOrderData, AmendAlgoData,
    AmendAlgoRequestBody, CandlesQuery, ClosePositionData, ClosePositionRequest, OrderData,
    PendingAlgoOrdersQuery, PlaceOrderRequest, PositionData, TickerData,
};

/// Moves request bytes to the exchange and back.
///
/// Implementations own the base URL, request signing and the demo-trading
/// header; the gateway only deals in paths, query pairs and JSON bodies.
#[async_trait]
pub trait OkxTransport: Send + Sync {
    /// `GET path?query`, returning the raw response body.
    async fn get(&self, path: &str, query: &[(&'static str, String)]) -> Result<String, GatewayError>;

    /// `POST path` with a JSON body, returning the raw response body.
    async fn post(&self, path: &str, body: String) -> Result<String, GatewayError>;
}

/// OKX gateway for cross-margin, net-mode perpetual swaps.
pub struct OkxGateway {
    transport: Arc<dyn OkxTransport>,
    margin_mode: MarginMode,
}

impl OkxGateway {
    pub fn new(transport: Arc<dyn OkxTransport>) -> Self {
        Self {
            transport,
            margin_mode: MarginMode::Cross,
        }
    }

    /// Margin mode sent with close-position requests.
    pub fn with_margin_mode(mut self, margin_mode: MarginMode) -> Self {
        self.margin_mode = margin_mode;
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(&'static str, String)>,
    ) -> Result<Vec<T>, GatewayError> {
        debug!(path, query = ?query, "OKX GET");
        let body = self.transport.get(path, &query).await?;
        parse_response(&body)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: String) -> Result<Vec<T>, GatewayError> {
        debug!(path, body = %body, "OKX POST");
        let response = self.transport.post(path, body).await?;
        parse_response(&response)
    }
}

fn encode<B: Serialize>(body: &B) -> Result<String, GatewayError> {
    serde_json::to_string(body)
        .map_err(|e| GatewayError::OrderRejected(format!("Cannot encode request: {}", e)))
}

fn first<T>(records: Vec<T>, path: &str) -> Result<T, GatewayError> {
    records
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("{} returned no data", path)))
}

#[async_trait]
impl ExchangeGateway for OkxGateway {
    async fn place_order(&self, intent: &OrderIntent) -> Result<OrderResult, GatewayError> {
        let body = encode(&PlaceOrderRequest::from(intent))?;
        let records: Vec<OrderData> = self.post(paths::PLACE_ORDER, body).await?;
        first(records, paths::PLACE_ORDER)?.into_order_result(&intent.instrument)
    }

    async fn close_position(&self, instrument: &str) -> Result<OrderResult, GatewayError> {
        let body = encode(&ClosePositionRequest::new(instrument, self.margin_mode))?;
        let records: Vec<ClosePositionData> = self.post(paths::CLOSE_POSITION, body).await?;
        Ok(first(records, paths::CLOSE_POSITION)?.into())
    }

    async fn pending_algo_orders(
        &self,
        instrument: &str,
        kind: AlgoOrderKind,
    ) -> Result<Vec<ProtectiveOrder>, GatewayError> {
        let query = PendingAlgoOrdersQuery::new(instrument, kind).to_pairs();
        let records: Vec<AlgoOrderData> = self.get(paths::PENDING_ALGO_ORDERS, query).await?;
        records.into_iter().map(ProtectiveOrder::try_from).collect()
    }

    async fn amend_algo_order(&self, request: &AmendAlgoRequest) -> Result<AmendResult, GatewayError> {
        let body = encode(&AmendAlgoRequestBody::from(request))?;
        let records: Vec<AmendAlgoData> = self.post(paths::AMEND_ALGO_ORDER, body).await?;
        first(records, paths::AMEND_ALGO_ORDER)?.into_amend_result(&request.instrument)
    }

    async fn ticker(&self, instrument: &str) -> Result<Option<Ticker>, GatewayError> {
        let query = vec![("instId", instrument.to_string())];
        let records: Vec<TickerData> = self.get(paths::TICKER, query).await?;
        match records.into_iter().next() {
            Some(data) => Ticker::try_from(data).map(Some),
            None => {
                warn!(instrument, "OKX returned no ticker");
                Ok(None)
            }
        }
    }

    async fn candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let query = CandlesQuery::new(instrument, timeframe, limit).to_pairs();
        let rows: Vec<Vec<String>> = self.get(paths::CANDLES, query).await?;
        parse_candles(rows)
    }

    async fn balance(&self, currency: &str) -> Result<Balance, GatewayError> {
        let query = vec![("ccy", currency.to_string())];
        let records: Vec<AccountBalanceData> = self.get(paths::BALANCE, query).await?;
        first(records, paths::BALANCE)?.balance(currency)
    }

    async fn positions(&self, instrument: &str) -> Result<Vec<Position>, GatewayError> {
        let query = vec![("instId", instrument.to_string())];
        let records: Vec<PositionData> = self.get(paths::POSITIONS, query).await?;
        let positions = records
            .into_iter()
            .map(Position::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions.into_iter().filter(Position::has_position).collect())
    }

    fn name(&self) -> &str {
        "OKX"
    }
}
