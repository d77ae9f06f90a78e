// Wallet auditing: turns balance queries into change-only snapshots

use chrono::Utc;

use crate::core::types::WalletSnapshot;
use crate::error::TradingResult;
use crate::exchange::ExchangeGateway;

#[derive(Debug, Clone)]
pub struct WalletTracker {
    stake_asset: String,
    trade_asset: String,
    last: Option<(f64, f64)>,
}

impl WalletTracker {
    pub fn new(stake_asset: impl Into<String>, trade_asset: impl Into<String>) -> Self {
        Self {
            stake_asset: stake_asset.into(),
            trade_asset: trade_asset.into(),
            last: None,
        }
    }

    /// Last balances seen as (stake, trade)
    pub fn last_balances(&self) -> Option<(f64, f64)> {
        self.last
    }

    /// Query both balances and return a snapshot if either moved
    ///
    /// The first successful sample always produces a snapshot. A failed
    /// query leaves the remembered balances untouched.
    pub async fn sample<G>(
        &mut self,
        gateway: &G,
        last_price: Option<f64>,
    ) -> TradingResult<Option<WalletSnapshot>>
    where
        G: ExchangeGateway + ?Sized,
    {
        let stake_balance = gateway.get_free_balance(&self.stake_asset).await?;
        let trade_balance = gateway.get_free_balance(&self.trade_asset).await?;
        let current = (stake_balance, trade_balance);

        if self.last == Some(current) {
            return Ok(None);
        }
        self.last = Some(current);

        Ok(Some(WalletSnapshot {
            timestamp: Utc::now(),
            stake_balance,
            trade_balance,
            last_price,
        }))
    }
}
