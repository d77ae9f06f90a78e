//! Exchange abstraction for the grid engine - enables paper trading and mocking for tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TradingResult;

pub mod binance;
pub mod paper;

pub use binance::BinanceClient;
pub use paper::PaperExchange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Exchange acknowledgement of a filled market order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: u64,
    pub client_order_id: String,
    pub side: OrderSide,
    pub executed_quantity: f64,
    /// Server-side execution time, milliseconds since the epoch
    pub transact_time: i64,
}

/// Lot size rules for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub min_quantity: f64,
    pub quantity_step_size: f64,
}

impl SymbolFilters {
    /// Decimal places implied by the step size, e.g. 0.01 -> 2, 1.0 -> 0
    pub fn quantity_precision(&self) -> u32 {
        if self.quantity_step_size <= 0.0 || self.quantity_step_size >= 1.0 {
            return 0;
        }
        (-self.quantity_step_size.log10()).round().max(0.0) as u32
    }
}

/// Source of the last traded price
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_price(&self) -> TradingResult<f64>;
}

/// Order execution and account queries
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn submit_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
    ) -> TradingResult<OrderConfirmation>;

    async fn get_free_balance(&self, asset: &str) -> TradingResult<f64>;

    async fn get_symbol_filters(&self, symbol: &str) -> TradingResult<SymbolFilters>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_precision() {
        let cases = [(0.01, 2), (1.0, 0), (0.1, 1), (0.00001, 5), (0.001, 3), (10.0, 0)];
        for (step, expected) in cases {
            let filters = SymbolFilters { min_quantity: 0.0, quantity_step_size: step };
            assert_eq!(filters.quantity_precision(), expected, "step {}", step);
        }
    }

    #[test]
    fn test_order_side_wire_names() {
        assert_eq!(OrderSide::Buy.as_str(), "BUY");
        assert_eq!(OrderSide::Sell.as_str(), "SELL");
    }
}
