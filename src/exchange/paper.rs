// Paper trading exchange: real prices, simulated fills

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{ExchangeGateway, OrderConfirmation, OrderSide, PriceFeed, SymbolFilters};
use crate::config::{ExchangeConfig, PaperConfig};
use crate::error::{TradingError, TradingResult};

#[derive(Debug)]
struct PaperState {
    balances: HashMap<String, f64>,
    last_price: Option<f64>,
    next_order_id: u64,
}

/// Fills market orders at the last price seen by `get_price`
pub struct PaperExchange<F: PriceFeed> {
    feed: F,
    symbol: String,
    base_asset: String,
    quote_asset: String,
    filters: SymbolFilters,
    state: Mutex<PaperState>,
}

impl<F: PriceFeed> PaperExchange<F> {
    pub fn new(feed: F, exchange: &ExchangeConfig, paper: &PaperConfig) -> Self {
        let mut balances = HashMap::new();
        balances.insert(exchange.quote_asset.clone(), paper.stake_balance);
        balances.insert(exchange.base_asset.clone(), paper.trade_balance);

        Self {
            feed,
            symbol: exchange.symbol.clone(),
            base_asset: exchange.base_asset.clone(),
            quote_asset: exchange.quote_asset.clone(),
            filters: SymbolFilters {
                min_quantity: paper.min_quantity,
                quantity_step_size: paper.quantity_step_size,
            },
            state: Mutex::new(PaperState {
                balances,
                last_price: None,
                next_order_id: 1,
            }),
        }
    }

    fn lock(&self) -> TradingResult<std::sync::MutexGuard<'_, PaperState>> {
        self.state
            .lock()
            .map_err(|_| TradingError::ContractViolation("paper exchange state poisoned".to_string()))
    }

    pub fn balance(&self, asset: &str) -> f64 {
        self.lock()
            .map(|state| state.balances.get(asset).copied().unwrap_or(0.0))
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl<F: PriceFeed> PriceFeed for PaperExchange<F> {
    async fn get_price(&self) -> TradingResult<f64> {
        let price = self.feed.get_price().await?;
        self.lock()?.last_price = Some(price);
        Ok(price)
    }
}

#[async_trait]
impl<F: PriceFeed> ExchangeGateway for PaperExchange<F> {
    async fn submit_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
    ) -> TradingResult<OrderConfirmation> {
        let mut state = self.lock()?;
        let price = state.last_price.ok_or_else(|| {
            TradingError::PriceUnavailable("no price observed before paper order".to_string())
        })?;

        if quantity <= 0.0 || quantity < self.filters.min_quantity {
            return Err(TradingError::OrderRejected(format!(
                "quantity {} below minimum {}",
                quantity, self.filters.min_quantity
            )));
        }

        let stake = state.balances.get(&self.quote_asset).copied().unwrap_or(0.0);
        let coin = state.balances.get(&self.base_asset).copied().unwrap_or(0.0);
        let cost = quantity * price;

        let (new_stake, new_coin) = match side {
            OrderSide::Buy => {
                if cost > stake {
                    return Err(TradingError::OrderRejected(format!(
                        "insufficient {}: need {:.8}, have {:.8}",
                        self.quote_asset, cost, stake
                    )));
                }
                (stake - cost, coin + quantity)
            }
            OrderSide::Sell => {
                if quantity > coin {
                    return Err(TradingError::OrderRejected(format!(
                        "insufficient {}: need {:.8}, have {:.8}",
                        self.base_asset, quantity, coin
                    )));
                }
                (stake + cost, coin - quantity)
            }
        };

        state.balances.insert(self.quote_asset.clone(), new_stake);
        state.balances.insert(self.base_asset.clone(), new_coin);

        let order_id = state.next_order_id;
        state.next_order_id += 1;
        debug!(symbol = %self.symbol, side = side.as_str(), quantity, price, "paper fill");

        Ok(OrderConfirmation {
            order_id,
            client_order_id: Uuid::new_v4().simple().to_string(),
            side,
            executed_quantity: quantity,
            transact_time: Utc::now().timestamp_millis(),
        })
    }

    async fn get_free_balance(&self, asset: &str) -> TradingResult<f64> {
        Ok(self.lock()?.balances.get(asset).copied().unwrap_or(0.0))
    }

    async fn get_symbol_filters(&self, symbol: &str) -> TradingResult<SymbolFilters> {
        if symbol != self.symbol {
            return Err(TradingError::SymbolFilters(format!(
                "paper exchange only trades {}, not {}",
                self.symbol, symbol
            )));
        }
        Ok(self.filters)
    }
}
