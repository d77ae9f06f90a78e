// Core types shared by the engine, the ledger and the wallet tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exchange::OrderConfirmation;

/// Stop-loss price meaning "no open position to protect"
pub const STOPLOSS_INACTIVE: f64 = f64::NEG_INFINITY;

/// Decimal places used for grid thresholds
pub const THRESHOLD_PRECISION: u32 = 5;

/// Decision taken for a single price observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    StopLoss,
    ResetGrid,
    NoOp,
}

/// One open lot, created by a buy and destroyed by a sell or stop-loss
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub amount: f64,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub buy: f64,
    pub sell: f64,
}

impl Thresholds {
    /// Grid centered on `price`, each side `grid_step` away
    pub fn centered(price: f64, grid_step: f64) -> Self {
        Self {
            buy: round_to(price * (1.0 - grid_step), THRESHOLD_PRECISION),
            sell: round_to(price * (1.0 + grid_step), THRESHOLD_PRECISION),
        }
    }
}

/// Read-only view of the engine's mutable state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridState {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub stoploss_price: f64,
    pub active_trades: usize,
}

impl GridState {
    pub fn stoploss_active(&self) -> bool {
        self.stoploss_price != STOPLOSS_INACTIVE
    }
}

/// State transition reported by the engine; rendering is left to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    PositionOpened {
        price: f64,
        position: Position,
        order: OrderConfirmation,
        before: Thresholds,
        after: Thresholds,
        stoploss_price: f64,
        ledger: Vec<Position>,
    },
    PositionClosed {
        price: f64,
        position: Position,
        order: OrderConfirmation,
        before: Thresholds,
        after: Thresholds,
        stoploss_price: f64,
        ledger: Vec<Position>,
    },
    StopLossTriggered {
        price: f64,
        position: Position,
        order: OrderConfirmation,
        trigger_price: f64,
        stoploss_price: f64,
        thresholds: Thresholds,
        ledger: Vec<Position>,
    },
    GridReset {
        price: f64,
        before: Thresholds,
        after: Thresholds,
    },
}

impl GridEvent {
    pub fn action(&self) -> Action {
        match self {
            GridEvent::PositionOpened { .. } => Action::Buy,
            GridEvent::PositionClosed { .. } => Action::Sell,
            GridEvent::StopLossTriggered { .. } => Action::StopLoss,
            GridEvent::GridReset { .. } => Action::ResetGrid,
        }
    }

    /// True when an order reached the exchange
    pub fn traded(&self) -> bool {
        !matches!(self, GridEvent::GridReset { .. })
    }
}

/// Balances observed after a change; append-only once persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub timestamp: DateTime<Utc>,
    pub stake_balance: f64,
    pub trade_balance: f64,
    pub last_price: Option<f64>,
}

/// Half-away-from-zero rounding to `places` decimals
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
