// Ordered book of open positions
//
// Insertion order is chronological buy order. Ordinary sells take from the
// tail (newest first); stop-losses take from the head (oldest first).

use std::collections::VecDeque;

use crate::core::types::Position;
use crate::error::{TradingError, TradingResult};

#[derive(Debug, Clone)]
pub struct PositionLedger {
    positions: VecDeque<Position>,
    capacity: usize,
}

impl PositionLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push_tail(&mut self, position: Position) -> TradingResult<()> {
        if self.positions.len() >= self.capacity {
            return Err(TradingError::ContractViolation(format!(
                "ledger full: {} open positions",
                self.capacity
            )));
        }
        if position.amount.is_nan() || position.amount <= 0.0 {
            return Err(TradingError::ContractViolation(format!(
                "position amount must be positive, got {}",
                position.amount
            )));
        }
        self.positions.push_back(position);
        Ok(())
    }

    /// Newest position, used by ordinary sells
    pub fn pop_tail(&mut self) -> TradingResult<Position> {
        self.positions
            .pop_back()
            .ok_or_else(|| TradingError::ContractViolation("pop_tail on empty ledger".to_string()))
    }

    /// Oldest position, used by stop-losses
    pub fn pop_head(&mut self) -> TradingResult<Position> {
        self.positions
            .pop_front()
            .ok_or_else(|| TradingError::ContractViolation("pop_head on empty ledger".to_string()))
    }

    pub fn peek_head(&self) -> Option<&Position> {
        self.positions.front()
    }

    pub fn peek_tail(&self) -> Option<&Position> {
        self.positions.back()
    }

    /// Open positions marked at `current_price`
    pub fn valuation(&self, current_price: f64) -> f64 {
        self.positions.iter().map(|p| p.amount * current_price).sum()
    }

    /// Stake committed to open positions at their entry prices
    pub fn cost_basis(&self) -> f64 {
        self.positions.iter().map(|p| p.amount * p.entry_price).sum()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn to_vec(&self) -> Vec<Position> {
        self.positions.iter().copied().collect()
    }
}
