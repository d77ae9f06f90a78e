// Binance spot REST client

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use super::{ExchangeGateway, OrderConfirmation, OrderSide, PriceFeed, SymbolFilters};
use crate::config::{Credentials, ExchangeConfig};
use crate::error::{TradingError, TradingResult};

type HmacSha256 = Hmac<Sha256>;

/// Binance error codes meaning the key pair or signature was refused
const AUTH_ERROR_CODES: [i64; 3] = [-1022, -2014, -2015];

#[derive(Debug, Clone, Copy, PartialEq)]
enum RequestKind {
    Query,
    Order,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotSizeFilter {
    min_qty: String,
    step_size: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    client_order_id: String,
    transact_time: i64,
    executed_qty: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    symbol: String,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
}

impl BinanceClient {
    pub fn new(
        base_url: impl Into<String>,
        symbol: impl Into<String>,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> TradingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TradingError::ApiConnection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            symbol: symbol.into(),
            credentials,
            recv_window_ms: 5000,
        })
    }

    pub fn from_config(
        exchange: &ExchangeConfig,
        credentials: Option<Credentials>,
    ) -> TradingResult<Self> {
        let mut client = Self::new(
            exchange.base_url(),
            exchange.symbol.clone(),
            credentials,
            Duration::from_secs(exchange.request_timeout_secs),
        )?;
        client.recv_window_ms = exchange.recv_window_ms;
        Ok(client)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Exchange clock, useful to spot local clock drift before signing
    pub async fn server_time(&self) -> TradingResult<i64> {
        let body = self.public_get("/api/v3/time", &[]).await?;
        let time: ServerTime = serde_json::from_str(&body)?;
        Ok(time.server_time)
    }

    fn credentials(&self) -> TradingResult<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            TradingError::ApiAuthentication("no API credentials configured".to_string())
        })
    }

    fn sign(&self, payload: &str) -> TradingResult<String> {
        let credentials = self.credentials()?;
        let mut mac = HmacSha256::new_from_slice(credentials.api_secret.as_bytes())
            .map_err(|e| TradingError::ApiAuthentication(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn public_get(&self, path: &str, params: &[(&str, String)]) -> TradingResult<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(params).send().await?;
        read_body(response, RequestKind::Query).await
    }

    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        kind: RequestKind,
    ) -> TradingResult<String> {
        let mut query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        query.push(format!("recvWindow={}", self.recv_window_ms));
        query.push(format!("timestamp={}", Utc::now().timestamp_millis()));
        let query = query.join("&");

        let signature = self.sign(&query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        debug!(method = method.as_str(), path, "signed request");

        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.credentials()?.api_key)
            .send()
            .await?;

        read_body(response, kind).await
    }
}

async fn read_body(response: reqwest::Response, kind: RequestKind) -> TradingResult<String> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(body);
    }

    Err(map_error(status, &body, kind))
}

fn map_error(status: StatusCode, body: &str, kind: RequestKind) -> TradingError {
    let (code, msg) = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => (Some(err.code), err.msg),
        Err(_) => (None, body.to_string()),
    };
    let detail = match code {
        Some(code) => format!("HTTP {} (code {}): {}", status.as_u16(), code, msg),
        None => format!("HTTP {}: {}", status.as_u16(), msg),
    };

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || code.map_or(false, |c| AUTH_ERROR_CODES.contains(&c))
    {
        return TradingError::ApiAuthentication(detail);
    }

    match status.as_u16() {
        418 | 429 => TradingError::ApiRateLimit(detail),
        400..=499 if kind == RequestKind::Order => TradingError::OrderRejected(detail),
        _ => TradingError::ApiResponse(detail),
    }
}

fn parse_decimal(value: &str, field: &str) -> TradingResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| TradingError::ApiResponse(format!("invalid {} '{}'", field, value)))
}

#[async_trait]
impl PriceFeed for BinanceClient {
    async fn get_price(&self) -> TradingResult<f64> {
        let body = self
            .public_get("/api/v3/ticker/price", &[("symbol", self.symbol.clone())])
            .await?;
        let ticker: TickerPrice = serde_json::from_str(&body)?;
        let price = parse_decimal(&ticker.price, "price")?;

        if !price.is_finite() || price <= 0.0 {
            return Err(TradingError::PriceUnavailable(format!("non-positive price {}", price)));
        }
        Ok(price)
    }
}

#[async_trait]
impl ExchangeGateway for BinanceClient {
    async fn submit_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
    ) -> TradingResult<OrderConfirmation> {
        let client_order_id = Uuid::new_v4().simple().to_string();
        let params = [
            ("symbol", self.symbol.clone()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
            ("newClientOrderId", client_order_id),
        ];

        let body = self
            .signed_request(Method::POST, "/api/v3/order", &params, RequestKind::Order)
            .await?;
        let order: OrderResponse = serde_json::from_str(&body)?;

        Ok(OrderConfirmation {
            order_id: order.order_id,
            client_order_id: order.client_order_id,
            side,
            executed_quantity: parse_decimal(&order.executed_qty, "executedQty")?,
            transact_time: order.transact_time,
        })
    }

    async fn get_free_balance(&self, asset: &str) -> TradingResult<f64> {
        let body = self
            .signed_request(Method::GET, "/api/v3/account", &[], RequestKind::Query)
            .await?;
        let account: AccountInfo = serde_json::from_str(&body)?;

        match account.balances.iter().find(|b| b.asset == asset) {
            Some(balance) => parse_decimal(&balance.free, "free"),
            None => Ok(0.0),
        }
    }

    async fn get_symbol_filters(&self, symbol: &str) -> TradingResult<SymbolFilters> {
        let body = self
            .public_get("/api/v3/exchangeInfo", &[("symbol", symbol.to_string())])
            .await
            .map_err(|e| TradingError::SymbolFilters(e.to_string()))?;
        let info: ExchangeInfo = serde_json::from_str(&body)
            .map_err(|e| TradingError::SymbolFilters(e.to_string()))?;

        let symbol_info = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| TradingError::SymbolFilters(format!("{} not listed", symbol)))?;

        let lot_size = symbol_info
            .filters
            .into_iter()
            .find(|f| f.get("filterType").and_then(|t| t.as_str()) == Some("LOT_SIZE"))
            .ok_or_else(|| TradingError::SymbolFilters(format!("{} has no LOT_SIZE filter", symbol)))?;
        let lot_size: LotSizeFilter = serde_json::from_value(lot_size)
            .map_err(|e| TradingError::SymbolFilters(e.to_string()))?;

        Ok(SymbolFilters {
            min_quantity: parse_decimal(&lot_size.min_qty, "minQty")
                .map_err(|e| TradingError::SymbolFilters(e.to_string()))?,
            quantity_step_size: parse_decimal(&lot_size.step_size, "stepSize")
                .map_err(|e| TradingError::SymbolFilters(e.to_string()))?,
        })
    }
}
