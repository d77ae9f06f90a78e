// Common test utilities and helpers
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use binance_grid_bot::{
    Config, ExchangeGateway, GridConfig, OrderConfirmation, OrderSide, PriceFeed, SymbolFilters,
    TradingError, TradingResult,
};

pub const SYMBOL: &str = "XRPBUSD";
pub const STAKE: &str = "BUSD";
pub const COIN: &str = "XRP";

/// Failure injected into the next order submission
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    Timeout,
    Rejected,
    Unauthorized,
}

impl Failure {
    fn to_error(self) -> TradingError {
        match self {
            Failure::Timeout => TradingError::ApiTimeout("injected timeout".to_string()),
            Failure::Rejected => TradingError::OrderRejected("injected rejection".to_string()),
            Failure::Unauthorized => TradingError::ApiAuthentication("injected 401".to_string()),
        }
    }
}

#[derive(Debug)]
struct MockState {
    prices: VecDeque<Option<f64>>,
    last_price: Option<f64>,
    balances: HashMap<String, f64>,
    orders: Vec<(OrderSide, f64, f64)>,
    order_failures: VecDeque<Failure>,
    balance_failures: usize,
    balance_failures_after_order: usize,
    filters_fail: bool,
}

/// In-memory exchange: scripted prices, instant fills at the last price
pub struct MockExchange {
    filters: SymbolFilters,
    state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new(stake_balance: f64, filters: SymbolFilters) -> Self {
        let mut balances = HashMap::new();
        balances.insert(STAKE.to_string(), stake_balance);
        balances.insert(COIN.to_string(), 0.0);

        Self {
            filters,
            state: Mutex::new(MockState {
                prices: VecDeque::new(),
                last_price: None,
                balances,
                orders: Vec::new(),
                order_failures: VecDeque::new(),
                balance_failures: 0,
                balance_failures_after_order: 0,
                filters_fail: false,
            }),
        }
    }

    /// Prices returned by successive `get_price` calls; `None` is a timeout
    pub fn with_prices(self, prices: &[Option<f64>]) -> Self {
        self.state.lock().unwrap().prices.extend(prices.iter().copied());
        self
    }

    pub fn set_price(&self, price: f64) {
        self.state.lock().unwrap().last_price = Some(price);
    }

    pub fn fail_next_order(&self, failure: Failure) {
        self.state.lock().unwrap().order_failures.push_back(failure);
    }

    pub fn fail_balance_queries(&self, count: usize) {
        self.state.lock().unwrap().balance_failures = count;
    }

    /// Fail `count` balance queries once the next order has filled
    pub fn fail_balance_queries_after_order(&self, count: usize) {
        self.state.lock().unwrap().balance_failures_after_order = count;
    }

    pub fn fail_filters(&self) {
        self.state.lock().unwrap().filters_fail = true;
    }

    pub fn orders(&self) -> Vec<(OrderSide, f64, f64)> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn balance(&self, asset: &str) -> f64 {
        self.state.lock().unwrap().balances.get(asset).copied().unwrap_or(0.0)
    }
}

#[async_trait]
impl PriceFeed for MockExchange {
    async fn get_price(&self) -> TradingResult<f64> {
        let mut state = self.state.lock().unwrap();
        match state.prices.pop_front() {
            Some(Some(price)) => {
                state.last_price = Some(price);
                Ok(price)
            }
            Some(None) => Err(TradingError::ApiTimeout("scripted price timeout".to_string())),
            None => Err(TradingError::PriceUnavailable("price script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl ExchangeGateway for MockExchange {
    async fn submit_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
    ) -> TradingResult<OrderConfirmation> {
        let mut state = self.state.lock().unwrap();
        if let Some(failure) = state.order_failures.pop_front() {
            return Err(failure.to_error());
        }

        let price = state
            .last_price
            .ok_or_else(|| TradingError::PriceUnavailable("no price yet".to_string()))?;
        let signed = match side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        *state.balances.entry(STAKE.to_string()).or_insert(0.0) -= signed * price;
        *state.balances.entry(COIN.to_string()).or_insert(0.0) += signed;
        state.orders.push((side, quantity, price));
        let armed = std::mem::take(&mut state.balance_failures_after_order);
        state.balance_failures += armed;

        Ok(OrderConfirmation {
            order_id: state.orders.len() as u64,
            client_order_id: format!("mock-{}", state.orders.len()),
            side,
            executed_quantity: quantity,
            transact_time: 1_700_000_000_000 + state.orders.len() as i64,
        })
    }

    async fn get_free_balance(&self, asset: &str) -> TradingResult<f64> {
        let mut state = self.state.lock().unwrap();
        if state.balance_failures > 0 {
            state.balance_failures -= 1;
            return Err(TradingError::ApiConnection("injected balance failure".to_string()));
        }
        Ok(state.balances.get(asset).copied().unwrap_or(0.0))
    }

    async fn get_symbol_filters(&self, symbol: &str) -> TradingResult<SymbolFilters> {
        if self.state.lock().unwrap().filters_fail || symbol != SYMBOL {
            return Err(TradingError::ApiResponse(format!("no filters for {}", symbol)));
        }
        Ok(self.filters)
    }
}

pub fn fine_filters() -> SymbolFilters {
    SymbolFilters { min_quantity: 0.01, quantity_step_size: 0.01 }
}

/// Engine parameters used by most scenarios
pub fn grid_config(grid_step: f64, max_open_trades: usize, stoploss_multiplier: Option<f64>) -> GridConfig {
    GridConfig {
        grid_step,
        max_open_trades,
        tradeable_stake_fraction: 0.8,
        stoploss_multiplier,
        stake_asset: STAKE.to_string(),
        min_quantity: 0.01,
        quantity_step_size: 0.01,
        quantity_precision: 2,
    }
}

/// Paper-mode config with a fast runner and telemetry under `dir`
pub fn create_test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.exchange.symbol = SYMBOL.to_string();
    config.exchange.base_asset = COIN.to_string();
    config.exchange.quote_asset = STAKE.to_string();
    config.runner.cycle_delay_ms = 1;
    config.runner.mean_price_samples = 1;
    config.runner.mean_price_interval_ms = 0;
    config.runner.wallet_audit_every = 1000;
    config.telemetry.db_path = dir.join("{symbol}.db").to_string_lossy().into_owned();
    config
}
