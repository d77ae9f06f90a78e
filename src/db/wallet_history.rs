//! Wallet history rows and the unrealized profit series derived from them

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::{format_timestamp, lock, parse_timestamp};
use crate::core::WalletSnapshot;

impl WalletSnapshot {
    fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(WalletSnapshot {
            timestamp: parse_timestamp(0, &row.get::<_, String>(0)?)?,
            stake_balance: row.get(1)?,
            trade_balance: row.get(2)?,
            last_price: row.get(3)?,
        })
    }

    /// Append snapshot for `symbol`
    pub fn insert(&self, conn: Arc<Mutex<Connection>>, symbol: &str) -> SqlResult<i64> {
        let conn = lock(&conn);
        conn.execute(
            "INSERT INTO wallet_history (
                symbol, timestamp, stake_balance, trade_balance, last_price
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                symbol,
                format_timestamp(&self.timestamp),
                self.stake_balance,
                self.trade_balance,
                self.last_price,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Snapshots for a symbol in chronological order
    ///
    /// With a `limit`, only the newest `limit` snapshots are returned (still
    /// oldest first).
    pub fn list_by_symbol(
        conn: Arc<Mutex<Connection>>,
        symbol: &str,
        limit: Option<usize>,
    ) -> SqlResult<Vec<Self>> {
        let conn = lock(&conn);
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(
            "SELECT timestamp, stake_balance, trade_balance, last_price FROM (
                SELECT id, timestamp, stake_balance, trade_balance, last_price
                FROM wallet_history WHERE symbol = ?1
                ORDER BY timestamp DESC, id DESC LIMIT ?2
             ) ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![symbol, limit], |row| Self::from_row(row))?;
        rows.collect()
    }

    pub fn latest(conn: Arc<Mutex<Connection>>, symbol: &str) -> SqlResult<Option<Self>> {
        let conn = lock(&conn);
        let mut stmt = conn.prepare(
            "SELECT timestamp, stake_balance, trade_balance, last_price
             FROM wallet_history WHERE symbol = ?1
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )?;

        let mut rows = stmt.query(params![symbol])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }
}

/// Unrealized profit at one snapshot, relative to the first one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitPoint {
    pub timestamp: DateTime<Utc>,
    pub profit: f64,
    pub profit_percent: f64,
}

/// Profit of every snapshot against the first: `Δstake + Δtrade × price`
///
/// Snapshots without a price reuse the last known one. The percentage is
/// taken against the starting stake balance and is 0 when that is 0.
pub fn profit_series(snapshots: &[WalletSnapshot]) -> Vec<ProfitPoint> {
    let Some(first) = snapshots.first() else {
        return Vec::new();
    };

    let mut price = first.last_price;
    snapshots
        .iter()
        .map(|snapshot| {
            price = snapshot.last_price.or(price);
            let stake_delta = snapshot.stake_balance - first.stake_balance;
            let trade_delta = snapshot.trade_balance - first.trade_balance;
            let profit = stake_delta + trade_delta * price.unwrap_or(0.0);
            let profit_percent = if first.stake_balance > 0.0 {
                profit / first.stake_balance * 100.0
            } else {
                0.0
            };

            ProfitPoint {
                timestamp: snapshot.timestamp,
                profit,
                profit_percent,
            }
        })
        .collect()
}
