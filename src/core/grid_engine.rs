// Grid decision logic and threshold/stop-loss bookkeeping
//
// Every mutating action talks to the exchange first and touches the ledger
// only once the order is confirmed. A failed call leaves the engine exactly
// as it was before the action began.

use crate::config::GridConfig;
use crate::core::ledger::PositionLedger;
use crate::core::types::{
    round_to, Action, GridEvent, GridState, Position, Thresholds, STOPLOSS_INACTIVE,
};
use crate::exchange::{ExchangeGateway, OrderSide};
use crate::error::{TradingError, TradingResult};

#[derive(Debug, Clone)]
pub struct GridEngine {
    config: GridConfig,
    thresholds: Thresholds,
    stoploss_price: f64,
    ledger: PositionLedger,
}

impl GridEngine {
    /// Create an idle engine with thresholds centered on `center_price`
    pub fn new(config: GridConfig, center_price: f64) -> Self {
        let thresholds = Thresholds::centered(center_price, config.grid_step);
        let ledger = PositionLedger::new(config.max_open_trades);
        Self {
            config,
            thresholds,
            stoploss_price: STOPLOSS_INACTIVE,
            ledger,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn active_trades(&self) -> usize {
        self.ledger.len()
    }

    pub fn stoploss_price(&self) -> f64 {
        self.stoploss_price
    }

    pub fn state(&self) -> GridState {
        GridState {
            buy_threshold: self.thresholds.buy,
            sell_threshold: self.thresholds.sell,
            stoploss_price: self.stoploss_price,
            active_trades: self.ledger.len(),
        }
    }

    /// Decide what to do at price `price`; the first matching rule wins
    pub fn evaluate(&self, price: f64) -> Action {
        let active = self.active_trades();

        if active > 0 && price > self.thresholds.sell {
            Action::Sell
        } else if active > 0 && price < self.stoploss_price {
            Action::StopLoss
        } else if active < self.config.max_open_trades && price < self.thresholds.buy {
            Action::Buy
        } else if active == 0 && price > self.thresholds.sell {
            Action::ResetGrid
        } else {
            Action::NoOp
        }
    }

    /// Evaluate `price` and run the chosen action against `gateway`
    pub async fn step<G>(&mut self, price: f64, gateway: &G) -> TradingResult<Option<GridEvent>>
    where
        G: ExchangeGateway + ?Sized,
    {
        if !price.is_finite() || price <= 0.0 {
            return Err(TradingError::PriceUnavailable(format!("unusable price {}", price)));
        }

        let event = match self.evaluate(price) {
            Action::Sell => self.apply_sell(price, gateway).await?,
            Action::StopLoss => self.apply_stop_loss(price, gateway).await?,
            Action::Buy => self.apply_buy(price, gateway).await?,
            Action::ResetGrid => self.apply_reset_grid(price)?,
            Action::NoOp => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Size of the next position given the free stake balance
    ///
    /// Total stake is the free balance plus what the open positions cost;
    /// each of the `max_open_trades` slots gets an equal share of the
    /// tradeable fraction of it.
    pub fn order_quantity(&self, price: f64, stake_balance: f64) -> TradingResult<f64> {
        let total_stake = stake_balance + self.ledger.cost_basis();
        let order_stake =
            total_stake * self.config.tradeable_stake_fraction / self.config.max_open_trades as f64;
        let quantity = round_to(order_stake / price, self.config.quantity_precision);

        if quantity <= 0.0 || quantity < self.config.min_quantity {
            return Err(TradingError::InsufficientQuantity {
                quantity,
                min_quantity: self.config.min_quantity,
            });
        }
        Ok(quantity)
    }

    pub async fn apply_buy<G>(&mut self, price: f64, gateway: &G) -> TradingResult<GridEvent>
    where
        G: ExchangeGateway + ?Sized,
    {
        if self.active_trades() >= self.config.max_open_trades {
            return Err(TradingError::ContractViolation(format!(
                "buy with {} of {} trades open",
                self.active_trades(),
                self.config.max_open_trades
            )));
        }

        let stake_balance = gateway.get_free_balance(&self.config.stake_asset).await?;
        let quantity = self.order_quantity(price, stake_balance)?;
        let order = gateway.submit_market_order(OrderSide::Buy, quantity).await?;

        let position = Position { amount: quantity, entry_price: price };
        self.ledger.push_tail(position)?;

        let before = self.thresholds;
        self.thresholds = Thresholds::centered(price, self.config.grid_step);
        self.refresh_stoploss();

        Ok(GridEvent::PositionOpened {
            price,
            position,
            order,
            before,
            after: self.thresholds,
            stoploss_price: self.stoploss_price,
            ledger: self.ledger.to_vec(),
        })
    }

    pub async fn apply_sell<G>(&mut self, price: f64, gateway: &G) -> TradingResult<GridEvent>
    where
        G: ExchangeGateway + ?Sized,
    {
        // Provisional removal; put back if the exchange refuses the order
        let position = self.ledger.pop_tail()?;

        let order = match gateway.submit_market_order(OrderSide::Sell, position.amount).await {
            Ok(order) => order,
            Err(err) => {
                self.ledger.push_tail(position)?;
                return Err(err);
            }
        };

        let before = self.thresholds;
        self.thresholds = Thresholds::centered(price, self.config.grid_step);
        self.refresh_stoploss();

        Ok(GridEvent::PositionClosed {
            price,
            position,
            order,
            before,
            after: self.thresholds,
            stoploss_price: self.stoploss_price,
            ledger: self.ledger.to_vec(),
        })
    }

    pub async fn apply_stop_loss<G>(&mut self, price: f64, gateway: &G) -> TradingResult<GridEvent>
    where
        G: ExchangeGateway + ?Sized,
    {
        let oldest = match self.ledger.peek_head() {
            Some(position) if price < self.stoploss_price => *position,
            Some(_) => {
                return Err(TradingError::ContractViolation(format!(
                    "stop-loss at {} above trigger {}",
                    price, self.stoploss_price
                )))
            }
            None => {
                return Err(TradingError::ContractViolation(
                    "stop-loss with no open positions".to_string(),
                ))
            }
        };

        let order = gateway.submit_market_order(OrderSide::Sell, oldest.amount).await?;
        let position = self.ledger.pop_head()?;
        let trigger_price = self.stoploss_price;
        self.refresh_stoploss();

        Ok(GridEvent::StopLossTriggered {
            price,
            position,
            order,
            trigger_price,
            stoploss_price: self.stoploss_price,
            thresholds: self.thresholds,
            ledger: self.ledger.to_vec(),
        })
    }

    pub fn apply_reset_grid(&mut self, price: f64) -> TradingResult<GridEvent> {
        if !self.ledger.is_empty() || price <= self.thresholds.sell {
            return Err(TradingError::ContractViolation(format!(
                "grid reset at {} with {} open trades and sell threshold {}",
                price,
                self.ledger.len(),
                self.thresholds.sell
            )));
        }

        let before = self.thresholds;
        self.thresholds = Thresholds::centered(price, self.config.grid_step);

        Ok(GridEvent::GridReset { price, before, after: self.thresholds })
    }

    fn refresh_stoploss(&mut self) {
        self.stoploss_price = match (self.ledger.peek_head(), self.config.stoploss_multiplier) {
            (Some(oldest), Some(multiplier)) => oldest.entry_price * (1.0 - multiplier),
            _ => STOPLOSS_INACTIVE,
        };
    }
}
